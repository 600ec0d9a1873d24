use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use hoopmetrix::checkout::{
    AuthSession, BillingCycle, CardInput, CheckoutDialog, CheckoutWorkflow, HttpCheckoutApi,
    StripeCardConfirmer,
};
use hoopmetrix::config::CheckoutConfig;
use hoopmetrix::plans::PlanCatalog;

type StdinLines = Lines<BufReader<Stdin>>;

async fn prompt(lines: &mut StdinLines, label: &str) -> anyhow::Result<String> {
    eprint!("{label}: ");
    let line = lines
        .next_line()
        .await?
        .context("stdin closed before checkout finished")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CheckoutConfig::from_env()?;
    let payment = config.require_payment()?.clone();

    eprintln!("🏀 HoopMetrix checkout v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   Payment network: {}\n", payment.api_base);

    let catalog = PlanCatalog::default();
    for plan in catalog.plans() {
        eprintln!(
            "   [{}] {} — ${}/month or ${}/year (save ${})",
            plan.id,
            plan.name,
            plan.monthly_price,
            plan.yearly_price,
            plan.yearly_savings()
        );
    }
    eprintln!();

    // A signed-in buyer is passed in through the environment; otherwise this is a guest checkout.
    let session = match std::env::var("HOOPMETRIX_SESSION_TOKEN") {
        Ok(token) => Some(AuthSession {
            user_id: std::env::var("HOOPMETRIX_USER_ID").unwrap_or_default(),
            email: std::env::var("HOOPMETRIX_USER_EMAIL").unwrap_or_default(),
            access_token: SecretString::from(token),
        }),
        Err(_) => None,
    };

    let api = Arc::new(HttpCheckoutApi::new(config.clone())?);
    let confirmer = Arc::new(StripeCardConfirmer::new(&payment));
    let workflow = Arc::new(
        CheckoutWorkflow::new(api, confirmer, &config).with_on_success(|outcome| {
            tracing::info!(run_id = %outcome.run_id, "Subscription active");
        }),
    );

    let mut progress = workflow.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let phase = *progress.borrow_and_update();
            if phase.is_busy() {
                eprintln!("   … {phase}");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let plan = loop {
        let plan_id = prompt(&mut lines, "Plan").await?;
        match catalog.get(&plan_id) {
            Some(plan) => break plan,
            None => eprintln!("   Unknown plan '{plan_id}'. Choose one of the plans listed above."),
        }
    };
    let cycle = loop {
        let raw = prompt(&mut lines, "Billing cycle (monthly/yearly)").await?;
        match raw.parse::<BillingCycle>() {
            Ok(cycle) => break cycle,
            Err(_) => eprintln!("   Unknown billing cycle '{raw}'. Enter monthly or yearly."),
        }
    };

    let guest = session.is_none();
    let dialog = CheckoutDialog::new(Arc::clone(&workflow), session);
    dialog.open(plan.selection(cycle)).await;

    let name = prompt(&mut lines, "Full name").await?;
    // Members reuse the session email unless the session did not carry one.
    let needs_email = dialog
        .form()
        .await
        .is_none_or(|form| form.email.trim().is_empty());
    let email = if needs_email {
        Some(prompt(&mut lines, "Email").await?)
    } else {
        None
    };
    let passwords = if guest {
        Some((
            prompt(&mut lines, "Password").await?,
            prompt(&mut lines, "Confirm password").await?,
        ))
    } else {
        None
    };
    dialog
        .update_form(|form| {
            form.name = name;
            if let Some(email) = email {
                form.email = email;
            }
            if let Some((password, confirm)) = passwords {
                form.password = SecretString::from(password);
                form.confirm_password = SecretString::from(confirm);
            }
        })
        .await?;

    let card = CardInput::new(prompt(&mut lines, "Card payment method (pm_...)").await?);

    match dialog.submit(&card).await {
        Ok(outcome) => {
            eprintln!("\n✅ Subscribed to {} ({})", plan.name, outcome.plan.billing_cycle);
            if outcome.account_created && !outcome.signed_in {
                eprintln!("   Your account is ready. Please sign in to continue.");
            }
            eprintln!("   Continue at {}", outcome.redirect_to);
        }
        Err(_) => {
            let message = dialog.error_message().await.unwrap_or_default();
            eprintln!("\n❌ {message}");
            std::process::exit(1);
        }
    }

    Ok(())
}
