//! Trial balance and per-entry-type reconciliation over posted ledger entries.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use revrec_domain::{round2, AccountNature, DoubleEntry, LedgerEntryType};

use crate::{repository::Repository, CoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrialBalanceLine {
    pub debit: Decimal,
    pub credit: Decimal,
    /// Debit-positive.
    pub net: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PostingTotals {
    pub debits: Decimal,
    pub credits: Decimal,
}

impl PostingTotals {
    pub fn is_balanced(&self) -> bool {
        self.debits == self.credits
    }
}

/// Per-account debits, credits and net, keyed and sorted by account label. Non-positive
/// amounts are ignored.
pub fn trial_balance<'a, E, I>(entries: I) -> BTreeMap<String, TrialBalanceLine>
where
    E: DoubleEntry + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let mut lines: BTreeMap<String, TrialBalanceLine> = BTreeMap::new();
    for entry in entries {
        let amount = entry.amount();
        if amount <= Decimal::ZERO {
            continue;
        }
        lines
            .entry(entry.debit_account().to_string())
            .or_default()
            .debit += amount;
        lines
            .entry(entry.credit_account().to_string())
            .or_default()
            .credit += amount;
    }
    for line in lines.values_mut() {
        line.debit = round2(line.debit);
        line.credit = round2(line.credit);
        line.net = round2(line.debit - line.credit);
    }
    lines
}

pub fn total_debits_credits<'a, E, I>(entries: I) -> PostingTotals
where
    E: DoubleEntry + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let total: Decimal = entries
        .into_iter()
        .map(DoubleEntry::amount)
        .filter(|amount| *amount > Decimal::ZERO)
        .sum();
    PostingTotals {
        debits: round2(total),
        credits: round2(total),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReconciliationLine {
    pub opening: Decimal,
    pub debit: Decimal,
    pub credit: Decimal,
    pub closing: Decimal,
}

/// Rolls `(entry type, amount)` pairs forward from `opening` balances.
///
/// Each amount lands on its type's natural side; types without a known nature use
/// `default_nature`. Debit-natured types close at `opening + debit - credit`, credit-natured
/// types at `opening - debit + credit`. Accounts appearing only in `opening` are reported
/// with their opening balance carried through.
pub fn compute_reconciliation<I>(
    entries: I,
    opening: &BTreeMap<LedgerEntryType, Decimal>,
    default_nature: AccountNature,
) -> BTreeMap<LedgerEntryType, ReconciliationLine>
where
    I: IntoIterator<Item = (LedgerEntryType, Decimal)>,
{
    let nature_of = |entry_type: &LedgerEntryType| entry_type.nature().unwrap_or(default_nature);

    let mut lines: BTreeMap<LedgerEntryType, ReconciliationLine> = opening
        .iter()
        .map(|(entry_type, balance)| {
            (
                entry_type.clone(),
                ReconciliationLine {
                    opening: *balance,
                    ..ReconciliationLine::default()
                },
            )
        })
        .collect();

    for (entry_type, amount) in entries {
        let nature = nature_of(&entry_type);
        let line = lines.entry(entry_type).or_default();
        match nature {
            AccountNature::Debit => line.debit += amount,
            AccountNature::Credit => line.credit += amount,
        }
    }

    for (entry_type, line) in lines.iter_mut() {
        let closing = match nature_of(entry_type) {
            AccountNature::Debit => line.opening + line.debit - line.credit,
            AccountNature::Credit => line.opening - line.debit + line.credit,
        };
        line.opening = round2(line.opening);
        line.debit = round2(line.debit);
        line.credit = round2(line.credit);
        line.closing = round2(closing);
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLedgerReport {
    pub contract_id: String,
    pub entries: usize,
    pub trial_balance: BTreeMap<String, TrialBalanceLine>,
    pub totals: PostingTotals,
    pub reconciliation: BTreeMap<LedgerEntryType, ReconciliationLine>,
}

/// Trial balance and reconciliation over every posting persisted for a contract.
pub fn contract_report(
    repo: &Repository<'_>,
    contract_id: &str,
    opening: &BTreeMap<LedgerEntryType, Decimal>,
) -> Result<ContractLedgerReport, CoreError> {
    let entries = repo.ledger_entries(contract_id)?;
    let reconciliation = compute_reconciliation(
        entries
            .iter()
            .filter(|entry| !entry.is_reversed)
            .map(|entry| (entry.entry_type.clone(), entry.amount)),
        opening,
        AccountNature::Debit,
    );
    let live: Vec<_> = entries.iter().filter(|entry| !entry.is_reversed).collect();
    Ok(ContractLedgerReport {
        contract_id: contract_id.to_string(),
        entries: live.len(),
        trial_balance: trial_balance(live.iter().copied()),
        totals: total_debits_credits(live.iter().copied()),
        reconciliation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(opening: Decimal, debit: Decimal, credit: Decimal, closing: Decimal) -> ReconciliationLine {
        ReconciliationLine {
            opening,
            debit,
            credit,
            closing,
        }
    }

    #[test]
    fn assets_and_liabilities_roll_forward_on_their_natural_side() {
        let entries = vec![
            (LedgerEntryType::Receivable, dec!(1000)),
            (LedgerEntryType::Cash, dec!(500)),
            (LedgerEntryType::ContractLiability, dec!(300)),
            (LedgerEntryType::Revenue, dec!(700)),
        ];
        let opening = BTreeMap::from([
            (LedgerEntryType::Receivable, dec!(200)),
            (LedgerEntryType::Cash, dec!(100)),
            (LedgerEntryType::ContractLiability, dec!(50)),
            (LedgerEntryType::Revenue, Decimal::ZERO),
        ]);
        let result = compute_reconciliation(entries, &opening, AccountNature::Debit);
        let zero = Decimal::ZERO;
        assert_eq!(
            result[&LedgerEntryType::Receivable],
            line(dec!(200), dec!(1000), zero, dec!(1200))
        );
        assert_eq!(
            result[&LedgerEntryType::Cash],
            line(dec!(100), dec!(500), zero, dec!(600))
        );
        assert_eq!(
            result[&LedgerEntryType::ContractLiability],
            line(dec!(50), zero, dec!(300), dec!(350))
        );
        assert_eq!(
            result[&LedgerEntryType::Revenue],
            line(zero, zero, dec!(700), dec!(700))
        );
    }

    #[test]
    fn unknown_types_use_the_default_nature() {
        let other = LedgerEntryType::from("unknown_account");
        let result = compute_reconciliation(
            vec![(other.clone(), dec!(250))],
            &BTreeMap::new(),
            AccountNature::Debit,
        );
        let zero = Decimal::ZERO;
        assert_eq!(result[&other], line(zero, dec!(250), zero, dec!(250)));

        let credit = compute_reconciliation(
            vec![(other.clone(), dec!(250))],
            &BTreeMap::new(),
            AccountNature::Credit,
        );
        assert_eq!(credit[&other], line(zero, zero, dec!(250), dec!(250)));
    }

    #[test]
    fn empty_input_reconciles_to_nothing() {
        let result = compute_reconciliation(Vec::new(), &BTreeMap::new(), AccountNature::Debit);
        assert!(result.is_empty());
    }
}
