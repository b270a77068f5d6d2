use std::fmt;

/// Macro defining the crate error type.
///
/// Generates:
/// - the enum definition
/// - code() method
/// - error_type() method
/// - message() method
macro_rules! define_linkforty_errors {
    ($(
        $variant:ident($code:literal, $type_name:literal)
    ),* $(,)?) => {
        #[derive(Debug, Clone)]
        pub enum LinkFortyError {
            $($variant(String),)*
        }

        impl LinkFortyError {
            /// Stable error code, used in logs and API error bodies
            pub fn code(&self) -> &'static str {
                match self {
                    $(LinkFortyError::$variant(_) => $code,)*
                }
            }

            /// Human-readable error class
            pub fn error_type(&self) -> &'static str {
                match self {
                    $(LinkFortyError::$variant(_) => $type_name,)*
                }
            }

            /// Error detail
            pub fn message(&self) -> &str {
                match self {
                    $(LinkFortyError::$variant(msg) => msg,)*
                }
            }
        }
    };
}

define_linkforty_errors! {
    CacheConnection("E001", "Cache Connection Error"),
    DatabaseConfig("E002", "Database Configuration Error"),
    DatabaseConnection("E003", "Database Connection Error"),
    DatabaseOperation("E004", "Database Operation Error"),
    Validation("E005", "Validation Error"),
    NotFound("E006", "Resource Not Found"),
    Serialization("E007", "Serialization Error"),
    DuplicateShortCode("E008", "Duplicate Short Code"),
    WebhookDelivery("E009", "Webhook Delivery Error"),
    GeoLookup("E010", "Geo Lookup Error"),
}

impl fmt::Display for LinkFortyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for LinkFortyError {}

// Convenience constructors
impl LinkFortyError {
    pub fn cache_connection<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::CacheConnection(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::DatabaseOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::Serialization(msg.into())
    }

    pub fn duplicate_short_code<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::DuplicateShortCode(msg.into())
    }

    pub fn webhook_delivery<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::WebhookDelivery(msg.into())
    }

    pub fn geo_lookup<T: Into<String>>(msg: T) -> Self {
        LinkFortyError::GeoLookup(msg.into())
    }
}

impl From<sea_orm::DbErr> for LinkFortyError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkFortyError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkFortyError {
    fn from(err: serde_json::Error) -> Self {
        LinkFortyError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkFortyError>;
