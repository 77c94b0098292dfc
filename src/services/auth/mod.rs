pub mod claims;
pub mod convert;
pub mod error;
pub mod factory;
pub mod gate;
pub mod jwks;
pub mod key_cache;
pub mod options;
pub mod verify;

pub use claims::TokenClaims;
pub use convert::{KeyFamily, VerificationKey, convert};
pub use error::{AuthError, JwtError, JwtErrorKind};
pub use factory::build_authorizer;
pub use gate::{Authorizer, RejectReason, VerificationOutcome};
pub use jwks::{HttpKeyFetcher, KeySet, KeySource, PublicKeyRecord};
pub use key_cache::CachedKeySource;
pub use options::AuthorizationOptions;
pub use verify::verify;
