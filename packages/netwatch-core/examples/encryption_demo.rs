//! # Encryption Demo
//!
//! Generates one key per algorithm and round-trips text and a binary
//! payload through each of them.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example encryption_demo
//! ```

use netwatch_core::crypto::Scheme;
use netwatch_core::CryptoService;

fn main() {
    println!("=== Netwatch Core: Encryption Demo ===\n");

    let service = CryptoService::in_memory();

    // Step 1: Capabilities
    println!("Step 1: Supported algorithms...");
    for capability in service.capabilities() {
        println!(
            "  {:<4} {:<12} {}",
            capability.name,
            capability.parameters,
            capability.operations.join(", ")
        );
    }
    println!();

    // Step 2: Keys
    println!("Step 2: Generating keys...");
    for (alias, algorithm) in [("k2", "AES"), ("rsa-demo", "RSA"), ("ec-demo", "EC")] {
        let handle = service
            .generate_key(alias, algorithm)
            .expect("Failed to generate key");
        println!(
            "  {:<9} {:<4} purposes={} id={}",
            handle.alias, handle.algorithm, handle.purposes, handle.key_id
        );
    }
    println!();

    // Step 3: Text with a fresh nonce every time
    println!("Step 3: Encrypting \"Hello World\" twice with AES...");
    let first = service
        .encrypt_text("Hello World", Some("AES"))
        .expect("Encryption failed");
    let second = service
        .encrypt_text("Hello World", Some("AES"))
        .expect("Encryption failed");
    println!("  Ciphertext 1: {}", first);
    println!("  Ciphertext 2: {}", second);
    println!(
        "  Different:    {}",
        if first != second { "[OK]" } else { "[FAILED]" }
    );
    for ciphertext in [&first, &second] {
        let plain = service
            .decrypt_text(ciphertext, Some("AES"))
            .expect("Decryption failed");
        println!("  Decrypted:    \"{}\"", plain);
    }
    println!();

    // Step 4: Each algorithm
    println!("Step 4: Text through every algorithm...");
    for algorithm in ["AES", "RSA", "EC"] {
        let ciphertext = service
            .encrypt_text("Meet at the usual place", Some(algorithm))
            .expect("Encryption failed");
        let plain = service
            .decrypt_text(&ciphertext, Some(algorithm))
            .expect("Decryption failed");
        println!(
            "  {:<4} {} chars of base64 -> \"{}\"",
            algorithm,
            ciphertext.len(),
            plain
        );
    }
    println!();

    // Step 5: Limits
    println!("Step 5: RSA-OAEP size limit...");
    let oversized = vec![0x42u8; 191];
    match service.encrypt_file(&oversized, Some("RSA")) {
        Ok(_) => println!("  [FAILED] 191 bytes were accepted"),
        Err(e) => println!("  [OK] {} ({})", e, e.kind()),
    }
    println!();

    // Step 6: Files
    println!("Step 6: Binary payload with EC (ECIES)...");
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let sealed = service
        .encrypt_file(&payload, Some("EC"))
        .expect("File encryption failed");
    let key = service.key_store().get_key("ec-demo").expect("Key missing");
    println!(
        "  {} bytes -> {} bytes, scheme {:?}",
        payload.len(),
        sealed.len(),
        Scheme::of(&sealed)
    );
    let opened = service
        .decrypt_file(&sealed, Some("EC"))
        .expect("File decryption failed");
    println!(
        "  Round trip: {}",
        if opened == payload { "[OK]" } else { "[FAILED]" }
    );
    println!("  Key used:   {} ({})", key.alias, key.algorithm);
    println!();

    // Step 7: Tampering
    println!("Step 7: Tamper detection...");
    let mut tampered = sealed.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    match service.decrypt_file(&tampered, Some("EC")) {
        Ok(_) => println!("  [FAILED] Tampered ciphertext was accepted!"),
        Err(e) => println!("  [OK] {}", e),
    }

    println!();
    println!("=== Example Complete ===");
}
