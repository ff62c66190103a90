use super::{truncate, DocumentCommands, PublishArgs};
use crate::config::TosConfig;
use anyhow::Result;
use tos_core::{Document, TermsOfService, WriteOrigin};

pub fn run(cmd: DocumentCommands, config: &TosConfig) -> Result<()> {
    config.validate()?;
    let tos = TermsOfService::open(config.db_path(), config.gate.clone())?;
    tos.initialize()?;

    match cmd {
        DocumentCommands::Publish(args) => publish(&tos, args),
        DocumentCommands::List => list(&tos),
    }
}

fn publish<C, S>(tos: &TermsOfService<C, S>, args: PublishArgs) -> Result<()>
where
    C: tos_core::VersionedCache,
    S: tos_core::TermsStore,
{
    let content = std::fs::read_to_string(&args.file)?;
    if content.trim().is_empty() {
        anyhow::bail!("{} is empty", args.file.display());
    }

    let mut document = Document::new(content, !args.draft);
    let outcome = tos.save_document(&mut document, WriteOrigin::Save)?;

    println!("Saved {}", document.id);
    println!("  {}", document);
    if outcome.deactivated > 0 {
        println!("  deactivated {} previous document(s)", outcome.deactivated);
    }
    Ok(())
}

fn list<C, S>(tos: &TermsOfService<C, S>) -> Result<()>
where
    C: tos_core::VersionedCache,
    S: tos_core::TermsStore,
{
    let documents = tos.list_documents()?;
    if documents.is_empty() {
        println!("(no documents, create one with `tos document publish --file <path>`)");
        return Ok(());
    }

    println!("{:<36}  {:<8}  {:<25}  {}", "ID", "STATE", "CREATED", "CONTENT");
    println!("{}", "─".repeat(100));
    for doc in &documents {
        let state = if doc.active { "active" } else { "inactive" };
        println!(
            "{:<36}  {:<8}  {:<25}  {}",
            doc.id,
            state,
            doc.created.format("%Y-%m-%d %H:%M:%S UTC"),
            truncate(&doc.content, 30)
        );
    }
    Ok(())
}
