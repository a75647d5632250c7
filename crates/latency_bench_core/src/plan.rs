use crate::contract::{BatchOrder, NormalizedBenchmarkRequest, ValidationError, Variant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationAssignment {
    pub variant: Variant,
    pub sequence: usize,
    pub inject_failure: bool,
}

/// Invocations that share one concurrency window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationBatch {
    pub assignments: Vec<InvocationAssignment>,
}

pub fn compute_invocation_plan(
    request: &NormalizedBenchmarkRequest,
) -> Result<Vec<InvocationBatch>, ValidationError> {
    let count = request.invocations_per_variant;
    if count == 0 {
        return Err(ValidationError::new("No invocations to issue"));
    }

    let assignment = |variant: Variant, sequence: usize| InvocationAssignment {
        variant,
        sequence,
        inject_failure: request.failure_injection.binary_search(&sequence).is_ok(),
    };

    let batches = match request.order {
        BatchOrder::Sequential => Variant::ALL
            .iter()
            .map(|&variant| InvocationBatch {
                assignments: (0..count)
                    .map(|sequence| assignment(variant, sequence))
                    .collect(),
            })
            .collect(),
        BatchOrder::Interleaved => {
            let mut assignments = Vec::with_capacity(count * Variant::ALL.len());
            for sequence in 0..count {
                for &variant in &Variant::ALL {
                    assignments.push(assignment(variant, sequence));
                }
            }
            vec![InvocationBatch { assignments }]
        }
    };

    validate_plan(count, &batches)?;
    Ok(batches)
}

fn validate_plan(count: usize, batches: &[InvocationBatch]) -> Result<(), ValidationError> {
    if batches.is_empty() {
        return Err(ValidationError::new("No invocations to issue"));
    }

    for variant in Variant::ALL {
        let mut sequences: Vec<usize> = batches
            .iter()
            .flat_map(|batch| batch.assignments.iter())
            .filter(|assignment| assignment.variant == variant)
            .map(|assignment| assignment.sequence)
            .collect();
        sequences.sort_unstable();

        if sequences.len() != count || sequences.iter().enumerate().any(|(idx, &seq)| idx != seq) {
            return Err(ValidationError::new(format!(
                "Invocation plan for variant {variant} does not cover sequences 0..{count} exactly once"
            )));
        }
    }

    Ok(())
}
