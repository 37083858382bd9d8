//! Reserved spellings of the host language.

/// Hard keywords; none of these may ever be produced as a name.
pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Soft keywords are legal identifiers but confusing to emit.
pub const SOFT_KEYWORDS: &[&str] = &["match", "case", "_", "type"];

/// Names resolved from the builtins module.
pub const BUILTINS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "copyright", "credits",
    "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec", "exit", "filter", "float",
    "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input",
    "int", "isinstance", "issubclass", "iter", "len", "license", "list", "locals", "map", "max",
    "memoryview", "min", "next", "object", "oct", "open", "ord", "pow", "print", "property",
    "quit", "range", "repr", "reversed", "round", "set", "setattr", "slice", "sorted",
    "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip", "__import__",
    "__build_class__", "__debug__", "__doc__", "__name__", "__package__", "__spec__",
    "__loader__", "__file__", "__builtins__", "NotImplemented", "Ellipsis",
    "ArithmeticError", "AssertionError", "AttributeError", "BaseException",
    "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError", "BytesWarning",
    "ChildProcessError", "ConnectionAbortedError", "ConnectionError", "ConnectionRefusedError",
    "ConnectionResetError", "DeprecationWarning", "EOFError", "EncodingWarning",
    "EnvironmentError", "Exception", "ExceptionGroup", "FileExistsError", "FileNotFoundError",
    "FloatingPointError", "FutureWarning", "GeneratorExit", "IOError", "ImportError",
    "ImportWarning", "IndentationError", "IndexError", "InterruptedError", "IsADirectoryError",
    "KeyError", "KeyboardInterrupt", "LookupError", "MemoryError", "ModuleNotFoundError",
    "NameError", "NotADirectoryError", "NotImplementedError", "OSError", "OverflowError",
    "PendingDeprecationWarning", "PermissionError", "ProcessLookupError", "RecursionError",
    "ReferenceError", "ResourceWarning", "RuntimeError", "RuntimeWarning", "StopAsyncIteration",
    "StopIteration", "SyntaxError", "SyntaxWarning", "SystemError", "SystemExit", "TabError",
    "TimeoutError", "TypeError", "UnboundLocalError", "UnicodeDecodeError",
    "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError", "UnicodeWarning",
    "UserWarning", "ValueError", "Warning", "ZeroDivisionError",
];

/// Attribute names that builtin types, modules and the object protocol
/// already define. A member with one of these names is never renamed, since
/// `obj.<name>` elsewhere in the file may refer to the builtin one.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    // object / type / function
    "mro", "register", "args", "kwargs", "func", "close", "send", "throw",
    // str / bytes
    "capitalize", "casefold", "center", "count", "decode", "encode", "endswith", "expandtabs",
    "find", "format", "format_map", "index", "isalnum", "isalpha", "isascii", "isdecimal",
    "isdigit", "isidentifier", "islower", "isnumeric", "isprintable", "isspace", "istitle",
    "isupper", "join", "ljust", "lower", "lstrip", "maketrans", "partition", "removeprefix",
    "removesuffix", "replace", "rfind", "rindex", "rjust", "rpartition", "rsplit", "rstrip",
    "split", "splitlines", "startswith", "strip", "swapcase", "title", "translate", "upper",
    "zfill", "hex", "fromhex",
    // int / float / complex
    "bit_length", "bit_count", "to_bytes", "from_bytes", "as_integer_ratio", "conjugate",
    "denominator", "numerator", "real", "imag", "is_integer",
    // list / dict / set / tuple
    "append", "clear", "copy", "extend", "insert", "pop", "remove", "reverse", "sort", "get",
    "items", "keys", "values", "popitem", "setdefault", "update", "fromkeys", "add", "discard",
    "difference", "difference_update", "intersection", "intersection_update", "isdisjoint",
    "issubset", "issuperset", "symmetric_difference", "symmetric_difference_update", "union",
    // files and io
    "read", "readline", "readlines", "write", "writelines", "seek", "tell", "flush", "fileno",
    "name", "mode", "closed", "truncate", "buffer",
    // exceptions, threads and misc protocol
    "with_traceback", "add_note", "run", "start", "result", "cancel", "done", "value",
    "deleter", "getter", "setter", "fget", "fset", "fdel", "tb_next", "exception",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

pub fn is_builtin(s: &str) -> bool {
    BUILTINS.contains(&s)
}

/// Members of builtin types; renaming one would break calls on real
/// strings, lists, files and so on.
pub fn is_reserved_attribute(s: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&s)
}

/// `__name__`-style names carry protocol meaning and are never renamed.
pub fn is_dunder(s: &str) -> bool {
    s.len() > 4 && s.starts_with("__") && s.ends_with("__")
}

/// Whether `s` is a valid identifier. ASCII rules only; generated names
/// never need more.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("var0"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("0var"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
        assert!(is_keyword("lambda"));
        assert!(!is_keyword("match"));
        assert!(is_dunder("__init__"));
        assert!(!is_dunder("__x"));
        assert!(!is_dunder("____"));
    }
}
