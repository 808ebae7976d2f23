use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

/// Generate a new secp256k1 keypair. The address of the pair is the hex of
/// the compressed public key (see [`address_of`]).
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    secp.generate_keypair(&mut OsRng)
}

/// Address for a public key: hex of the compressed (33 byte) encoding.
pub fn address_of(public_key: &PublicKey) -> String {
    hex::encode(public_key.serialize())
}

/// Resolve the public key behind an address. Returns `None` for anything
/// that is not a hex-encoded secp256k1 public key.
pub fn public_key_from_address(address: &str) -> Option<PublicKey> {
    let bytes = hex::decode(address).ok()?;
    PublicKey::from_slice(&bytes).ok()
}

/// Public key matching a secret key.
pub fn public_key_of(secret_key: &SecretKey) -> PublicKey {
    let secp = Secp256k1::signing_only();
    PublicKey::from_secret_key(&secp, secret_key)
}

/// Sign a 32-byte message hash, returning the hex DER signature.
pub fn sign_hex(secret_key: &SecretKey, msg32: [u8; 32]) -> String {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(msg32);
    let sig = secp.sign_ecdsa(&msg, secret_key);
    hex::encode(sig.serialize_der().to_vec())
}

/// Verify a hex DER signature over a 32-byte message hash.
pub fn verify_signature_hex(
    public_key: &PublicKey,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let msg = Message::from_digest(msg32);
    Ok(secp.verify_ecdsa(&msg, &sig, public_key).is_ok())
}
