//! Authentication module for Shacker
//!
//! Provides password and Ethereum wallet authentication.
//! - bcrypt password credentials
//! - Nonce challenge-response sign-in with EIP-191 signatures
//! - Wallet linking and ERC-721 ownership checks
//! - Stateless session tokens

pub mod crypto;
mod jwt;
mod nft;
mod password;
mod wallet;

pub use crypto::{normalize_address, verify_wallet_signature, CryptoError};
pub use jwt::{ExtraClaims, SessionClaims, SessionIssuer, TokenError};
pub use nft::{NftChecker, NftOwnership};
pub use password::{PasswordAuthenticator, PasswordError, MIN_PASSWORD_LEN};
pub use wallet::{
    auth_message, check_link_message, link_message, placeholder_username, WalletAuthenticator,
    WalletError, NONCE_TTL_MINUTES,
};
