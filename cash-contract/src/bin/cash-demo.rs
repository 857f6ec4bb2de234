//! Cash contract demo: craft, sign and verify a spend

use anyhow::Context;
use cash_contract::{
    crypto::{sign_skeleton, SchemeRegistry},
    Amount, CashState, CashVerifier, Config, Currency, Deposit, Institution, SpendCrafter,
};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting cash contract demo");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => Config::from_env()?,
    };
    let registry = SchemeRegistry::from_config(&config.signing)?;
    tracing::info!(
        default_scheme = %registry.default_scheme().id,
        signer_policy = ?config.verifier.signer_policy,
        "Configuration loaded"
    );

    let bank = registry.generate_key_pair(None)?;
    let alice = registry.generate_key_pair(None)?;
    let bob = registry.generate_key_pair(Some("ECDSA_SECP256K1_SHA256"))?;

    let deposit = Deposit::new(
        Institution::new("MegaBank", bank.party_key().clone()),
        b"reserve-1".to_vec(),
    );
    let wallet = vec![
        CashState::new(deposit.clone(), Amount::new(5_000, Currency::USD), alice.party_key().clone()),
        CashState::new(deposit, Amount::new(4_000, Currency::USD), alice.party_key().clone()),
    ];

    let crafter = SpendCrafter::new(config.crafter.clone());
    let skeleton = crafter.craft_spend(
        Amount::new(7_000, Currency::USD),
        bob.party_key(),
        &wallet,
    )?;
    for output in &skeleton.outputs {
        tracing::info!(%output, "Crafted output");
    }

    let tx = sign_skeleton(&registry, skeleton, &[alice], chrono::Utc::now())?;
    let verifier = CashVerifier::new(config.verifier.clone());
    match verifier.verify(&tx) {
        Ok(()) => tracing::info!("Transaction accepted"),
        Err(reason) => tracing::warn!(%reason, "Transaction rejected"),
    }

    println!("{}", serde_json::to_string_pretty(&tx)?);

    tracing::info!("Shutting down cash contract demo");
    Ok(())
}
