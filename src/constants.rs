// Server configuration
pub const DEFAULT_HOST: [u8; 4] = [0, 0, 0, 0];
pub const DEFAULT_PORT: u16 = 5000;
pub const STATIC_DIR: &str = "frontend-static";
pub const INDEX_FILE: &str = "index.html";
pub const AUTH_BASE_PATH: &str = "/api/auth";
pub const BODY_LIMIT_BYTES: usize = 100 * 1024;

// Environment variables
pub const PORT_VAR: &str = "PORT";
pub const MONGO_URI_VAR: &str = "MONGO_URI";
pub const JWT_SECRET_VAR: &str = "JWT_SECRET";
pub const NODE_ENV_VAR: &str = "NODE_ENV";
pub const RUST_LOG_VAR: &str = "RUST_LOG";
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";
pub const DOTENV_FIELD: &str = ".env";

// Logging
pub const DEFAULT_LOG_FILTER: &str = "gatehouse=info,tower_http=info";

// Token configuration
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

// Database
pub const APP_NAME: &str = "gatehouse";
pub const DEFAULT_DATABASE_NAME: &str = "gatehouse";
pub const USERS_COLLECTION: &str = "users";
pub const SERVER_SELECTION_TIMEOUT_SECS: u64 = 10;

// Validation limits
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 6;

// Client session storage
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const LOGIN_LOCATION: &str = "/";

// Error messages
pub const ERR_DATABASE_OPERATION: &str = "Database operation failed";
pub const ERR_EMAIL_TAKEN: &str = "Email already registered";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const ERR_UNAUTHORIZED: &str = "Not authorized";
