use tos_core::{GateConfig, GateDecision, GateRequest, SessionData, TermsOfService, User, WriteOrigin};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== TOS Gate Basic Usage Example ===\n");

    std::fs::create_dir_all("./data")?;
    let tos = TermsOfService::open("./data/example.redb", GateConfig::default())?;
    let version = tos.initialize()?;
    println!("1. Opened database, cache generation {}\n", version);

    let first = tos.publish("Be excellent to each other.")?;
    println!("2. Published {}\n", first);

    tos.save_user(&User::new(1, "alice"), WriteOrigin::Save)?;
    tos.save_user(&User::new(2, "root").with_superuser(true), WriteOrigin::Save)?;
    println!("3. Saved users alice (1) and root (2, superuser)\n");

    let request = GateRequest {
        method: "GET",
        path: "/inbox",
        is_ajax: false,
    };

    let mut alice = SessionData::authenticated(1, "password");
    let outcome = tos.gate().evaluate(&request, &mut alice)?;
    println!("4. alice requests /inbox: {:?} via {}", outcome.decision, outcome.path);
    if let GateDecision::RedirectToAcceptance { location } = &outcome.decision {
        println!("   redirected to {}", location);
    }

    let mut root = SessionData::authenticated(2, "password");
    let outcome = tos.gate().evaluate(&request, &mut root)?;
    println!("   root requests /inbox: {:?} via {}\n", outcome.decision, outcome.path);

    let agreement = tos.accept(1)?;
    println!("5. alice accepted terms {}", agreement.document_id);
    let outcome = tos.gate().evaluate(&request, &mut alice)?;
    println!("   alice requests /inbox: {:?} via {}\n", outcome.decision, outcome.path);

    tos.publish("Be excellent to each other. Party on.")?;
    let outcome = tos.gate().evaluate(&request, &mut alice)?;
    println!(
        "6. New terms published (generation {}), alice: {:?}",
        tos.generation().current()?,
        outcome.decision
    );

    Ok(())
}
