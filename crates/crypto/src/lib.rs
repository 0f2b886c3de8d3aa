//! BLS12-381 primitives for validator key shares.
//!
//! Validators hold Shamir shares s_i of a master secret s. For a fixed public
//! identity each validator submits
//!
//! - a key share `sk_i = s_i · H(identity)` in G2, and
//! - a commitment `C_i = s_i · G1` binding the share to its index.
//!
//! Any `t` shares that pass the pairing check `e(C_i, H(id)) = e(G1, sk_i)`
//! combine, by Lagrange interpolation in the exponent, into the identity's
//! decryption key `s · H(identity)`. Ciphertexts encrypted to the identity
//! under `MPK = s · G1` open with that key.

pub mod curve;
pub mod error;
pub mod ibe;
pub mod sharing;
pub mod threshold;

pub use curve::{Bls12, PairingBackend};
pub use error::{CryptoError, CurveGroup};
pub use ibe::{decrypt, encrypt};
pub use threshold::{
    combine_key_shares, lagrange_coefficient, verify_aggregated_key, verify_key_share,
};
