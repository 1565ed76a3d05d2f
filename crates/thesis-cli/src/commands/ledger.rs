use serde::Serialize;
use thesis_core::enums::Track;
use thesis_core::ledger::{LedgerKey, SupervisionLedger};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::{LedgerCommands, LedgerKeyArgs};
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Ledger row with its derived remaining capacity.
#[derive(Serialize)]
struct LedgerView {
    #[serde(flatten)]
    ledger: SupervisionLedger,
    remaining: u32,
}

impl From<SupervisionLedger> for LedgerView {
    fn from(ledger: SupervisionLedger) -> Self {
        let remaining = ledger.remaining();
        Self { ledger, remaining }
    }
}

fn ledger_key(args: &LedgerKeyArgs) -> anyhow::Result<LedgerKey> {
    let track: Track = parse_enum(&args.track, "track")?;
    Ok(LedgerKey::new(&args.supervisor, &args.semester, track))
}

/// Handle `thesis ledger`.
pub async fn handle(
    action: &LedgerCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        LedgerCommands::Provision { key, max_slots } => {
            let key = ledger_key(key)?;
            let ledger = ctx
                .service
                .provision_ledger(&ctx.admin, key, *max_slots)
                .await?;
            output(&LedgerView::from(ledger), flags.format)
        }
        LedgerCommands::Show { key } => {
            let ledger = ctx.service.get_ledger(&ledger_key(key)?).await?;
            output(&LedgerView::from(ledger), flags.format)
        }
        LedgerCommands::List { semester, track } => {
            let track = track
                .as_deref()
                .map(|t| parse_enum::<Track>(t, "track"))
                .transpose()?;
            let ledgers: Vec<LedgerView> = ctx
                .service
                .list_ledgers(semester, track)
                .await?
                .into_iter()
                .map(LedgerView::from)
                .collect();
            output(&ledgers, flags.format)
        }
        LedgerCommands::Delete { key } => {
            let key = ledger_key(key)?;
            ctx.service.delete_ledger(&ctx.admin, &key).await?;
            output(&serde_json::json!({ "deleted": key.to_string() }), flags.format)
        }
    }
}
