//! Helpers for moving values in and out of the BN254 scalar field
//!
//! All wire encodings of field elements are either fixed 32-byte big-endian
//! buffers or base-10 decimal strings; everything here canonicalizes to the
//! least residue

use ark_ff::{BigInteger, PrimeField};
use constants::{Scalar, SCALAR_BYTES_LEN};
use num_bigint::BigUint;

// ---------------------------
// | Conversions From Scalar |
// ---------------------------

/// Convert a scalar to a `BigUint`
pub fn scalar_to_biguint(a: &Scalar) -> BigUint {
    a.into_bigint().into()
}

/// Encode a scalar as a fixed 32-byte big-endian buffer
pub fn scalar_to_be_bytes(a: &Scalar) -> [u8; SCALAR_BYTES_LEN] {
    a.into_bigint()
        .to_bytes_be()
        .try_into()
        .expect("scalar encoding is always 32 bytes")
}

/// Render a scalar as a base-10 decimal string
pub fn scalar_to_decimal_string(a: &Scalar) -> String {
    scalar_to_biguint(a).to_str_radix(10 /* radix */)
}

/// Render a scalar as a 0x-prefixed hex string
pub fn scalar_to_hex_string(a: &Scalar) -> String {
    format!("0x{}", hex_encode(&scalar_to_be_bytes(a)))
}

// -------------------------
// | Conversions To Scalar |
// -------------------------

/// Convert a `BigUint` to a scalar, reducing modulo the field order
pub fn biguint_to_scalar(a: &BigUint) -> Scalar {
    Scalar::from(a.clone())
}

/// Interpret a big-endian byte buffer as an integer and reduce it into the
/// field
pub fn scalar_from_be_bytes(bytes: &[u8]) -> Scalar {
    Scalar::from_be_bytes_mod_order(bytes)
}

/// Parse a base-10 decimal string into a scalar, reducing modulo the field
/// order
pub fn scalar_from_decimal_string(s: &str) -> Result<Scalar, String> {
    let val = s
        .parse::<BigUint>()
        .map_err(|e| format!("invalid decimal field element: {e}"))?;
    Ok(biguint_to_scalar(&val))
}

// -----------
// | Helpers |
// -----------

/// Hex-encode a byte slice without any prefix
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------
// | Tests |
// ---------
