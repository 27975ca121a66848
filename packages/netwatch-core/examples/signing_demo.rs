//! # Signing Demo
//!
//! Signs text with EC and RSA keys and shows how tampering is caught.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example signing_demo
//! ```

use netwatch_core::CryptoService;

fn main() {
    println!("=== Netwatch Core: Signing Demo ===\n");

    let service = CryptoService::in_memory();

    // Step 1: Keys
    println!("Step 1: Generating signing keys...");
    let ec = service.generate_key("k1", "EC").expect("Failed to generate EC key");
    let rsa = service.generate_key("rsa-signer", "RSA").expect("Failed to generate RSA key");
    println!("  {} -> {} ({})", ec.alias, ec.algorithm, ec.purposes);
    println!("  {} -> {} ({})", rsa.alias, rsa.algorithm, rsa.purposes);
    println!();

    // Step 2: Sign
    let message = "Hello World";
    println!("Step 2: Signing \"{}\"...", message);
    let signature = service.sign_text(message, Some("EC")).expect("Signing failed");
    println!("  ECDSA signature (base64): {}", signature);
    println!();

    // Step 3: Verify
    println!("Step 3: Verifying...");
    match service.verify_text(message, &signature, Some("EC")) {
        Ok(true) => println!("  [OK] Signature is valid!"),
        Ok(false) => println!("  [FAILED] Signature rejected!"),
        Err(e) => println!("  [FAILED] {}", e),
    }
    println!();

    // Step 4: Forgery detection
    println!("Step 4: Forgery detection...");
    match service.verify_text("Hello World!", &signature, Some("EC")) {
        Ok(false) => println!("  [OK] Tampered message detected - signature invalid!"),
        other => println!("  [FAILED] Unexpected result: {:?}", other),
    }

    let mut raw = netwatch_core::service::decode_base64(&signature).expect("Bad base64");
    raw[0] ^= 0x01;
    let flipped = base64_url(&raw);
    match service.verify_text(message, &flipped, Some("EC")) {
        Ok(false) => println!("  [OK] Flipped signature byte detected!"),
        other => println!("  [FAILED] Unexpected result: {:?}", other),
    }

    let rsa_signature = service.sign_text(message, Some("RSA")).expect("Signing failed");
    match service.verify_text_with_key(message, &rsa_signature, "k1") {
        Err(e) => println!("  [OK] RSA signature against EC key: {} ({})", e, e.kind()),
        Ok(valid) => println!("  [FAILED] Wrong key returned {}", valid),
    }
    println!();

    // Step 5: AES cannot sign
    println!("Step 5: Signing with a cipher-only key...");
    service.generate_key("aes-only", "AES").expect("Failed to generate AES key");
    match service.sign_text_with_key(message, "aes-only") {
        Err(e) => println!("  [OK] {} ({})", e, e.kind()),
        Ok(_) => println!("  [FAILED] AES key produced a signature"),
    }
    println!();

    // Step 6: Several messages
    println!("Step 6: Signing multiple messages with RSA...");
    let messages = ["Key rotated", "File uploaded", "Session opened"];
    for (i, msg) in messages.iter().enumerate() {
        let sig = service.sign_text(msg, Some("RSA")).expect("Signing failed");
        let valid = service.verify_text(msg, &sig, Some("RSA")).unwrap_or(false);
        println!("  Message {}: \"{}\"", i + 1, msg);
        println!("    Signature: {}...", &sig[..24]);
        println!("    Valid: {}", if valid { "[OK]" } else { "[FAILED]" });
    }
    println!();

    println!("=== Example Complete ===");
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE.encode(bytes)
}
