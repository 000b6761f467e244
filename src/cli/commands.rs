use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde_json::json;

use revrec_config::{Config, ConfigManager};
use revrec_core::{
    api_recompute_for_contract, api_replay_ledger, contract_report, BillingService, Caller, Clock,
    CoreError, EngineContext, EngineOptions, SweepService, SystemClock, TriggerService,
};
use revrec_domain::{BillingStatus, LedgerEntryType};
use revrec_storage_json::JsonDocumentStore;

use super::{output::Printer, BillingCommand, Cli, Command, ReconcileArgs};
use crate::{bundle::ContractBundle, engine_options, errors::AppError, utils::app_data_dir};

/// Everything one invocation works against: resolved paths, configuration, and the store.
pub struct Session {
    pub base: PathBuf,
    pub config: Config,
    pub options: EngineOptions,
    pub store: JsonDocumentStore,
    pub clock: SystemClock,
    pub caller: Caller,
    pub printer: Printer,
}

impl Session {
    pub fn open(cli: &Cli) -> Result<Self, AppError> {
        let base = cli.home.clone().unwrap_or_else(app_data_dir);
        let config = ConfigManager::with_base_dir(base.clone())?.load()?;
        crate::init_with_filter(&config.log_filter);
        let store = JsonDocumentStore::new(config.resolve_data_root(&base))?;
        Ok(Self {
            options: engine_options(&config),
            base,
            config,
            store,
            clock: SystemClock,
            caller: Caller::new(cli.user.clone(), cli.tenant.clone()),
            printer: Printer::new(cli.quiet),
        })
    }

    fn ctx(&self) -> EngineContext<'_> {
        EngineContext::new(
            &self.store,
            &self.caller.tenant_id,
            &self.clock,
            &self.options,
        )
    }

    fn now_or(&self, instant: Option<DateTime<Utc>>) -> DateTime<Utc> {
        instant.unwrap_or_else(|| self.clock.now())
    }
}

pub fn run(cli: Cli) -> Result<(), AppError> {
    let session = Session::open(&cli)?;
    let printer = &session.printer;
    match cli.command {
        Command::Import { file, as_of } => {
            let bundle = ContractBundle::read(&file, &session.config.default_currency)?;
            let ctx = session.ctx();
            let imported = bundle.import(&ctx.repo)?;
            let created =
                TriggerService::on_contract_created(&ctx, &imported.contract_id, session.now_or(as_of))?;
            printer.section(format!("Imported contract {}", imported.contract_id));
            printer.warnings(&created.billing.warnings);
            printer.json(&json!({ "imported": imported, "onCreate": created }))
        }
        Command::Recompute {
            contract_id,
            version,
            as_of,
        } => {
            let result = api_recompute_for_contract(
                &session.store,
                &session.caller,
                &session.clock,
                &session.options,
                &contract_id,
                version.as_deref(),
                as_of,
            );
            match result {
                Ok(result) => {
                    printer.section(format!(
                        "Recognition for {} (version {})",
                        result.contract_id, result.version_number
                    ));
                    printer.warnings(&result.warnings);
                    printer.warnings(&result.errors);
                    printer.json(&result)
                }
                Err(failure) => {
                    printer.warnings(failure.warnings.iter().chain(&failure.errors));
                    Err(failure.into())
                }
            }
        }
        Command::Billing(BillingCommand::Generate { contract_id }) => {
            let generation = BillingService::generate(&session.ctx(), &contract_id)?;
            printer.section(format!(
                "Billing schedule for {}: {} rows created",
                contract_id,
                generation.created.len()
            ));
            printer.warnings(&generation.warnings);
            printer.json(&generation)
        }
        Command::Billing(BillingCommand::Status {
            billing_id,
            status,
            at,
            paid_amount,
        }) => {
            let ctx = session.ctx();
            let trigger = TriggerService::change_billing_status(
                &ctx,
                &billing_id,
                status.into(),
                session.now_or(at),
                paid_amount,
            )?;
            let row = ctx.repo.billing_schedule(&billing_id)?;
            printer.section(format!(
                "Billing {billing_id} is now {}",
                BillingStatus::from(status)
            ));
            printer.json(&json!({ "billing": row, "trigger": trigger }))
        }
        Command::Satisfy {
            obligation_id,
            at,
            as_of,
        } => {
            let at = session.now_or(at);
            let outcome = TriggerService::on_obligation_satisfied(
                &session.ctx(),
                &obligation_id,
                at,
                as_of.unwrap_or(at),
            )?;
            printer.section(format!(
                "Obligation {obligation_id} satisfied; {} postings created",
                outcome.replay.created
            ));
            printer.json(&outcome)
        }
        Command::Replay { contract_id, up_to } => {
            let counts = api_replay_ledger(
                &session.store,
                &session.caller,
                &session.clock,
                &session.options,
                &contract_id,
                up_to,
            )?;
            printer.section(format!(
                "Ledger replay for {contract_id}: {} created, {} skipped",
                counts.created, counts.skipped
            ));
            printer.json(&counts)
        }
        Command::Sweep { tenants, as_of } => {
            let tenants = if !tenants.is_empty() {
                tenants
            } else if !session.config.sweep_tenants.is_empty() {
                session.config.sweep_tenants.clone()
            } else {
                vec![session.caller.tenant_id.clone()]
            };
            let report = SweepService::run(
                &session.store,
                &tenants,
                &session.clock,
                &session.options,
                session.now_or(as_of),
            );
            printer.section(format!(
                "Sweep: {} of {} contracts succeeded",
                report.succeeded, report.contracts
            ));
            let failures: Vec<String> = report
                .failures
                .iter()
                .map(|failure| {
                    format!(
                        "{}/{}: {}",
                        failure.tenant_id,
                        failure.contract_id.as_deref().unwrap_or("-"),
                        failure.message
                    )
                })
                .collect();
            printer.warnings(&failures);
            printer.json(&report)
        }
        Command::TrialBalance { contract_id } => {
            let report = ledger_report(&session, &contract_id, &BTreeMap::new())?;
            printer.section(format!(
                "Trial balance for {contract_id} over {} postings",
                report.entries
            ));
            if !report.totals.is_balanced() {
                printer.warnings(&[format!(
                    "debits {} do not equal credits {}",
                    report.totals.debits, report.totals.credits
                )]);
            }
            printer.json(&json!({
                "contractId": report.contract_id,
                "entries": report.entries,
                "trialBalance": report.trial_balance,
                "totals": report.totals,
            }))
        }
        Command::Reconcile(ReconcileArgs {
            contract_id,
            opening,
        }) => {
            let opening: BTreeMap<LedgerEntryType, _> = opening
                .into_iter()
                .map(|(entry_type, amount)| (LedgerEntryType::from(entry_type), amount))
                .collect();
            let report = ledger_report(&session, &contract_id, &opening)?;
            printer.section(format!("Reconciliation for {contract_id}"));
            printer.json(&json!({
                "contractId": report.contract_id,
                "reconciliation": report.reconciliation,
            }))
        }
        Command::Config => {
            printer.section(format!("Configuration under {}", session.base.display()));
            printer.json(&json!({
                "home": session.base,
                "dataRoot": session.store.root(),
                "config": session.config,
            }))
        }
    }
}

fn ledger_report(
    session: &Session,
    contract_id: &str,
    opening: &BTreeMap<LedgerEntryType, rust_decimal::Decimal>,
) -> Result<revrec_core::ContractLedgerReport, AppError> {
    let ctx = session.ctx();
    if ctx.repo.contract(contract_id)?.is_none() {
        return Err(CoreError::NotFound(format!("contract {contract_id}")).into());
    }
    Ok(contract_report(&ctx.repo, contract_id, opening)?)
}
