/// Parse and encoding failures for the shared value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    InvalidMoney(String),
    InvalidShortCode(String),
    InvalidDay(String),
    FieldTooLong { tag: &'static str, len: usize },
}

impl std::fmt::Display for TypesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMoney(msg) => write!(f, "invalid money amount: {msg}"),
            Self::InvalidShortCode(msg) => write!(f, "invalid short code: {msg}"),
            Self::InvalidDay(msg) => write!(f, "invalid day: {msg}"),
            Self::FieldTooLong { tag, len } => {
                write!(f, "field {tag} is {len} bytes, TLV values are limited to 99")
            }
        }
    }
}

impl std::error::Error for TypesError {}
