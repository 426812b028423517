use super::heap::Ptr;

/// Failures raised while executing a program
#[derive(Debug)]
pub enum RuntimeError {
    MissingFunction(String),
    InvalidEntryPoint(String),
    NullPointer { op: &'static str },
    InvalidPointer { ptr: Ptr, op: &'static str },
    OutOfRange { ptr: Ptr, index: i32, len: usize },
    ArrayUnderflow { ptr: Ptr },
    DivisionByZero,
    UndefinedVariable(String),
    StackImbalance { ints: isize, strings: isize },
    StackUnderflow,
    CallDepthExceeded(usize),
    StepLimitExceeded(u64),
    HeapLimitExceeded(usize),
    TypeMismatch { ptr: Ptr, op: &'static str },
    Io(std::io::Error),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RuntimeError::MissingFunction(name) => write!(f, "Runtime error: unknown function '{}'", name),
            RuntimeError::InvalidEntryPoint(name) => {
                write!(f, "Runtime error: entry point '{}' must take no arguments", name)
            }
            RuntimeError::NullPointer { op } => write!(f, "Runtime error: {}: null pointer", op),
            RuntimeError::InvalidPointer { ptr, op } => {
                write!(f, "Runtime error: {}: invalid pointer {}", op, ptr)
            }
            RuntimeError::OutOfRange { ptr, index, len } => write!(
                f,
                "Runtime error: index {} out of range for cell {} of length {}",
                index, ptr, len
            ),
            RuntimeError::ArrayUnderflow { ptr } => {
                write!(f, "Runtime error: pop from empty array (cell {})", ptr)
            }
            RuntimeError::DivisionByZero => write!(f, "Runtime error: division by zero"),
            RuntimeError::UndefinedVariable(name) => {
                write!(f, "Runtime error: undefined variable '{}'", name)
            }
            RuntimeError::StackImbalance { ints, strings } => write!(
                f,
                "Runtime error: expression left unbalanced stacks (int {:+}, string {:+})",
                ints, strings
            ),
            RuntimeError::StackUnderflow => write!(f, "Runtime error: evaluation stack underflow"),
            RuntimeError::CallDepthExceeded(max) => {
                write!(f, "Runtime error: call depth exceeded (max {})", max)
            }
            RuntimeError::StepLimitExceeded(max) => {
                write!(f, "Runtime error: step limit exceeded (max {})", max)
            }
            RuntimeError::HeapLimitExceeded(max) => {
                write!(f, "Runtime error: heap cell limit exceeded (max {})", max)
            }
            RuntimeError::TypeMismatch { ptr, op } => {
                write!(f, "Runtime error: {}: unexpected cell kind at {}", op, ptr)
            }
            // the io::Error itself is the source
            RuntimeError::Io(_) => write!(f, "Runtime error: I/O failed"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e)
    }
}
