pub mod auth_service;
pub mod cleanup_service;
pub mod election_service;
pub mod email_service;
pub mod image_store;
pub mod otp_service;
pub mod token_blocklist;
pub mod token_service;
pub mod user_service;
pub mod voting_service;
pub mod whitelist_service;

pub use auth_service::{AuthService, AuthServiceError};
pub use cleanup_service::{spawn_cleanup_jobs, CleanupService};
pub use election_service::{ElectionError, ElectionService};
pub use email_service::{create_email_service, EmailService, MockEmailService, SmtpEmailService};
pub use image_store::{ImageStore, LocalImageStore};
pub use otp_service::OtpService;
pub use token_blocklist::{InMemoryTokenBlocklist, RedisTokenBlocklist, TokenBlocklist};
pub use token_service::{Claims, TokenService, TokenSettings, TokenType};
pub use user_service::UserService;
pub use voting_service::VotingService;
pub use whitelist_service::WhitelistService;
