pub mod allowed_voter;
pub mod candidate;
pub mod election;
pub mod otp;
pub mod position;
pub mod user;
pub mod vote;

pub use allowed_voter::AllowedVoter;
pub use candidate::{Candidate, CandidateView};
pub use election::{Election, ElectionStatus};
pub use otp::{Otp, OtpType};
pub use position::Position;
pub use user::{PublicUser, User};
pub use vote::Vote;
