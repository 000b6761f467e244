//! Contract modifications: which version of a contract owns which stretch of its revenue
//! timeline.
//!
//! Each version owns the revenue dated from its effective date up to the next version's
//! effective date. A version without an effective date takes over on the day after the last
//! period its predecessor had recognized.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use revrec_domain::{round2, ContractVersion, PerformanceObligation, RecognitionMethod};

use crate::{event_service::ObligationSchedule, repository::Repository, CoreError};

/// One version together with the dates it owns.
#[derive(Debug, Clone)]
pub struct VersionSegment {
    pub version: ContractVersion,
    /// First day owned by this version; `NaiveDate::MIN` for the original version.
    pub from: NaiveDate,
    /// First day owned by the next version; `None` for the last one.
    pub until: Option<NaiveDate>,
    pub obligations: Vec<ObligationSchedule>,
}

impl VersionSegment {
    fn owns(&self, date: NaiveDate) -> bool {
        date >= self.from && self.until.map_or(true, |until| date < until)
    }

    /// Obligations with their over-time rows restricted to the days this version owns. A
    /// satisfied point-in-time obligation stays with the version it was satisfied under.
    pub fn owned_obligations(&self) -> Vec<ObligationSchedule> {
        self.obligations
            .iter()
            .filter_map(|entry| match entry.obligation.recognition_method {
                RecognitionMethod::OverTime => Some(ObligationSchedule {
                    obligation: entry.obligation.clone(),
                    rows: entry
                        .rows
                        .iter()
                        .filter(|row| self.owns(row.period_end))
                        .cloned()
                        .collect(),
                }),
                RecognitionMethod::PointInTime => {
                    let satisfied = entry.obligation.satisfied_date.map(|at| at.date_naive());
                    let kept = match (self.until, satisfied) {
                        (None, _) => true,
                        (Some(until), Some(date)) => date < until,
                        (Some(_), None) => false,
                    };
                    kept.then(|| entry.clone())
                }
            })
            .collect()
    }

    /// Over-time revenue this version owns whose period ended on or before `through`, or
    /// all of it when `through` is `None`.
    pub fn owned_over_time_revenue(&self, through: Option<NaiveDate>) -> Decimal {
        self.owned_obligations()
            .iter()
            .filter(|entry| entry.obligation.recognition_method == RecognitionMethod::OverTime)
            .flat_map(|entry| entry.rows.iter())
            .filter(|row| through.map_or(true, |through| row.period_end <= through))
            .map(|row| row.scheduled_amount)
            .sum()
    }

    /// Day after the last recognized over-time period this version owns.
    fn recognized_through(&self) -> Option<NaiveDate> {
        self.owned_obligations()
            .iter()
            .flat_map(|entry| entry.rows.iter())
            .filter(|row| row.is_recognized)
            .map(|row| row.period_end)
            .max()
            .and_then(|end| end.succ_opt())
    }
}

/// The chain of versions of one contract, oldest first, ending at a given version.
#[derive(Debug, Clone)]
pub struct VersionTimeline {
    segments: Vec<VersionSegment>,
}

impl VersionTimeline {
    /// Loads every version numbered below `last` plus `last` itself, with their persisted
    /// obligations and schedules, and assigns each its window.
    pub fn load(repo: &Repository<'_>, last: &ContractVersion) -> Result<Self, CoreError> {
        let mut chain: Vec<ContractVersion> = repo
            .versions(&last.contract_id)?
            .into_iter()
            .filter(|version| version.version_number < last.version_number)
            .collect();
        chain.sort_by_key(|version| version.version_number);
        chain.push(last.clone());

        let mut segments = Vec::with_capacity(chain.len());
        for version in chain {
            let mut obligations = Vec::new();
            for obligation in repo.obligations(&version.id)? {
                let rows = repo.schedules_for_obligation(&obligation.id)?;
                obligations.push(ObligationSchedule { obligation, rows });
            }
            segments.push(VersionSegment {
                version,
                from: NaiveDate::MIN,
                until: None,
                obligations,
            });
        }
        Ok(Self::chain(segments))
    }

    /// Links consecutive segments: each one's `from` becomes its predecessor's `until`.
    fn chain(mut segments: Vec<VersionSegment>) -> Self {
        for index in 1..segments.len() {
            let previous = &segments[index - 1];
            let from = segments[index]
                .version
                .effective_date
                .or_else(|| previous.recognized_through())
                .unwrap_or(previous.from)
                .max(previous.from);
            segments[index - 1].until = Some(from);
            segments[index].from = from;
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[VersionSegment] {
        &self.segments
    }

    /// The day the last version took over, or `None` when it is the only version.
    pub fn takeover_date(&self) -> Option<NaiveDate> {
        match self.segments.as_slice() {
            [_, .., last] => Some(last.from),
            _ => None,
        }
    }

    /// Over-time revenue owned by the versions before the last one.
    pub fn prior_over_time_revenue(&self, through: Option<NaiveDate>) -> Decimal {
        let prior = self.segments.len().saturating_sub(1);
        self.segments[..prior]
            .iter()
            .map(|segment| segment.owned_over_time_revenue(through))
            .sum()
    }

    /// Every version's obligations restricted to what that version owns.
    pub fn owned_obligations(&self) -> Vec<ObligationSchedule> {
        self.segments
            .iter()
            .flat_map(VersionSegment::owned_obligations)
            .collect()
    }
}

/// Splits revenue recognized under earlier versions across the over-time obligations of the
/// new version, in proportion to their allocated prices. The last over-time obligation takes
/// the rounding remainder; point-in-time obligations get nothing.
pub fn split_prior_revenue(obligations: &[PerformanceObligation], prior: Decimal) -> Vec<Decimal> {
    let mut shares = vec![Decimal::ZERO; obligations.len()];
    let over_time: Vec<usize> = obligations
        .iter()
        .enumerate()
        .filter(|(_, obligation)| obligation.recognition_method == RecognitionMethod::OverTime)
        .map(|(index, _)| index)
        .collect();
    let Some(&last) = over_time.last() else {
        return shares;
    };
    let weight: Decimal = over_time
        .iter()
        .map(|&index| obligations[index].allocated_price)
        .sum();
    let mut assigned = Decimal::ZERO;
    for &index in &over_time {
        let share = if index == last {
            prior - assigned
        } else if weight.is_zero() {
            round2(prior / Decimal::from(over_time.len()))
        } else {
            round2(prior * obligations[index].allocated_price / weight)
        };
        assigned += share;
        shares[index] = share;
    }
    shares
}
