// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Task model
//!
//! A task travels client → server with its parameters and back with its
//! result slot filled. The set of task kinds is closed; the server only
//! runs a kind once its artifact has been uploaded (see [`TaskRegistry`]).

pub mod registry;

pub use registry::TaskRegistry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest Fibonacci term count whose terms all fit in a `u64`
pub const MAX_SEQUENCE_COUNT: u32 = 93;
/// Upper bound on the perfect number search range
pub const MAX_PERFECT_LIMIT: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Parameter out of range for {kind}: {reason}")]
    ParameterOutOfRange { kind: TaskKind, reason: String },

    #[error("Task implementation '{0}' has not been uploaded")]
    Unresolved(String),

    #[error("Unknown task kind '{0}'")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    SequenceGeneration,
    PerfectNumberSearch,
    Factorization,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::SequenceGeneration,
        TaskKind::PerfectNumberSearch,
        TaskKind::Factorization,
    ];

    /// Artifact name that provides this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::SequenceGeneration => "sequence-generation",
            TaskKind::PerfectNumberSearch => "perfect-number-search",
            TaskKind::Factorization => "factorization",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TaskError::UnknownKind(s.to_string()))
    }
}

/// Result of a completed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Sequence(Vec<u64>),
    PerfectNumbers(BTreeMap<u64, Vec<u64>>),
    Factors(Vec<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// First `count` Fibonacci terms, starting 0 1
    SequenceGeneration { count: u32, result: Option<Vec<u64>> },
    /// Perfect numbers up to `limit` with their proper divisors
    PerfectNumberSearch {
        limit: u64,
        result: Option<BTreeMap<u64, Vec<u64>>>,
    },
    /// Prime factors with multiplicity, ascending
    Factorization { number: u64, result: Option<Vec<u64>> },
}

impl Task {
    pub fn sequence_generation(count: u32) -> Self {
        Task::SequenceGeneration { count, result: None }
    }

    pub fn perfect_number_search(limit: u64) -> Self {
        Task::PerfectNumberSearch { limit, result: None }
    }

    pub fn factorization(number: u64) -> Self {
        Task::Factorization { number, result: None }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::SequenceGeneration { .. } => TaskKind::SequenceGeneration,
            Task::PerfectNumberSearch { .. } => TaskKind::PerfectNumberSearch,
            Task::Factorization { .. } => TaskKind::Factorization,
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        let out_of_range = |reason: String| TaskError::ParameterOutOfRange {
            kind: self.kind(),
            reason,
        };

        match self {
            Task::SequenceGeneration { count, .. } if *count > MAX_SEQUENCE_COUNT => Err(
                out_of_range(format!("count {} exceeds {}", count, MAX_SEQUENCE_COUNT)),
            ),
            Task::PerfectNumberSearch { limit, .. } if *limit > MAX_PERFECT_LIMIT => Err(
                out_of_range(format!("limit {} exceeds {}", limit, MAX_PERFECT_LIMIT)),
            ),
            Task::Factorization { number: 0, .. } => {
                Err(out_of_range("number must be at least 1".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Run the computation and fill the result slot
    pub fn execute(&mut self) -> Result<(), TaskError> {
        self.validate()?;
        match self {
            Task::SequenceGeneration { count, result } => *result = Some(fibonacci(*count)),
            Task::PerfectNumberSearch { limit, result } => *result = Some(perfect_numbers(*limit)),
            Task::Factorization { number, result } => *result = Some(prime_factors(*number)),
        }
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.result().is_some()
    }

    pub fn result(&self) -> Option<TaskOutcome> {
        match self {
            Task::SequenceGeneration { result, .. } => result.clone().map(TaskOutcome::Sequence),
            Task::PerfectNumberSearch { result, .. } => {
                result.clone().map(TaskOutcome::PerfectNumbers)
            }
            Task::Factorization { result, .. } => result.clone().map(TaskOutcome::Factors),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::SequenceGeneration { count, result: Some(terms) } => {
                write!(f, "Generating Fibonacci sequence up to number {} :", count)?;
                for term in terms {
                    write!(f, " {}", term)?;
                }
                Ok(())
            }
            Task::PerfectNumberSearch { limit, result: Some(found) } => {
                write!(f, "Perfect numbers up to {} and their divisors:", limit)?;
                for (number, divisors) in found {
                    write!(f, "\n{} (Divisors:", number)?;
                    for d in divisors {
                        write!(f, " {}", d)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Task::Factorization { number, result: Some(factors) } => {
                write!(f, "Prime factors of {} are:", number)?;
                for factor in factors {
                    write!(f, " {}", factor)?;
                }
                Ok(())
            }
            Task::SequenceGeneration { count, result: None } => {
                write!(f, "{}({}) [pending]", self.kind(), count)
            }
            Task::PerfectNumberSearch { limit, result: None } => {
                write!(f, "{}({}) [pending]", self.kind(), limit)
            }
            Task::Factorization { number, result: None } => {
                write!(f, "{}({}) [pending]", self.kind(), number)
            }
        }
    }
}

fn fibonacci(count: u32) -> Vec<u64> {
    let mut terms = Vec::with_capacity(count as usize);
    let (mut a, mut b) = (0u64, 1u64);
    for i in 0..count {
        terms.push(a);
        // the step after the last term would overflow at count == 93
        if i + 1 < count {
            let next = a + b;
            a = b;
            b = next;
        }
    }
    terms
}

fn perfect_numbers(limit: u64) -> BTreeMap<u64, Vec<u64>> {
    let limit = limit as usize;
    if limit < 2 {
        return BTreeMap::new();
    }

    // Sum of proper divisors for every n <= limit
    let mut sums = vec![0u64; limit + 1];
    for d in 1..=limit / 2 {
        for multiple in (2 * d..=limit).step_by(d) {
            sums[multiple] += d as u64;
        }
    }

    (2..=limit)
        .filter(|&n| sums[n] == n as u64)
        .map(|n| (n as u64, proper_divisors(n as u64)))
        .collect()
}

fn proper_divisors(n: u64) -> Vec<u64> {
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            low.push(i);
            let pair = n / i;
            if pair != i && pair != n {
                high.push(pair);
            }
        }
        i += 1;
    }
    if n > 1 {
        low.retain(|&d| d != n);
    }
    low.extend(high.into_iter().rev());
    low
}

fn prime_factors(mut n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    for p in [2u64, 3] {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
    }

    // 6k ± 1 wheel
    let mut i = 5u64;
    while i <= n / i {
        for p in [i, i + 2] {
            while n % p == 0 {
                factors.push(p);
                n /= p;
            }
        }
        i += 6;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}
