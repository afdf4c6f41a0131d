//! Amplitude-group indexing for kernels.
//!
//! A k-qubit gate on an n-qubit statevector partitions the `2^n` amplitude
//! indices into `2^(n-k)` groups of `2^k`. Group `g` is identified by a base
//! index whose target bits are all zero; its members are `base | offset[j]`,
//! where `j` is the gate-local index (bit `i` of `j` is `qubits[i]`).
//!
//! Two ways of computing the base are provided and always agree:
//!
//! | Method | Technique |
//! |--------|-----------|
//! | [`IndexingDescriptor::group_base_masked`] | insert a zero bit at each sorted target position |
//! | [`IndexingDescriptor::group_base_deposit`] | deposit the bits of `g` into the non-target mask ([`pdep`]) |

use qfuse_ir::{IrError, MAX_INDEX_WIDTH, QubitId, qubit_mask};
use serde::Serialize;

use crate::error::{CompileError, CompileResult};

/// Parallel bit deposit.
///
/// Scatters the low-order bits of `value` into the set positions of `mask`,
/// lowest first. Matches the semantics of the x86 BMI2 `pdep` instruction.
#[inline]
pub fn pdep(value: u64, mask: u64) -> u64 {
    let mut result = 0;
    let mut remaining = mask;
    let mut bit = 1u64;
    while remaining != 0 {
        let lowest = remaining & remaining.wrapping_neg();
        if value & bit != 0 {
            result |= lowest;
        }
        remaining &= remaining - 1;
        bit = bit.wrapping_shl(1);
    }
    result
}

/// Mask with the low `num_qubits` bits set.
#[inline]
pub fn full_mask(num_qubits: u32) -> u64 {
    if num_qubits >= 64 {
        u64::MAX
    } else {
        (1u64 << num_qubits) - 1
    }
}

/// Precomputed index arithmetic for one gate on an n-qubit statevector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexingDescriptor {
    num_qubits: u32,
    qubits: Vec<QubitId>,
    sorted_bits: Vec<u32>,
    qubit_mask: u64,
    offsets: Vec<u64>,
}

impl IndexingDescriptor {
    /// Build the descriptor for a gate on `qubits` over `num_qubits` qubits.
    pub fn new(qubits: &[QubitId], num_qubits: u32) -> CompileResult<Self> {
        if num_qubits as usize > MAX_INDEX_WIDTH {
            return Err(IrError::ArityOverflow {
                num_qubits: num_qubits as usize,
                context: "statevector",
            }
            .into());
        }
        if let Some(&qubit) = qubits.iter().find(|q| q.0 >= num_qubits) {
            return Err(CompileError::QubitOutOfRange { qubit, num_qubits });
        }

        let mut sorted_bits: Vec<u32> = qubits.iter().map(|q| q.bit()).collect();
        sorted_bits.sort_unstable();

        let offsets = (0..1u64 << qubits.len())
            .map(|local| {
                qubits
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| local & (1u64 << i) != 0)
                    .fold(0, |offset, (_, q)| offset | q.mask())
            })
            .collect();

        Ok(Self {
            num_qubits,
            qubits: qubits.to_vec(),
            sorted_bits,
            qubit_mask: qubit_mask(qubits),
            offsets,
        })
    }

    /// Statevector width.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Target qubits in gate order.
    pub fn qubits(&self) -> &[QubitId] {
        &self.qubits
    }

    /// Number of target qubits.
    pub fn arity(&self) -> usize {
        self.qubits.len()
    }

    /// Number of amplitude groups, `2^(n-k)`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_groups(&self) -> u64 {
        1u64 << (self.num_qubits - self.qubits.len() as u32)
    }

    /// Amplitudes per group, `2^k`.
    pub fn group_size(&self) -> usize {
        self.offsets.len()
    }

    /// Bits of the target qubits.
    pub fn qubit_mask(&self) -> u64 {
        self.qubit_mask
    }

    /// Offset of each gate-local index within a group.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Base index of group `g` by inserting zero bits at the target positions.
    #[inline]
    pub fn group_base_masked(&self, group: u64) -> u64 {
        let mut base = group;
        for &bit in &self.sorted_bits {
            let low = base & ((1u64 << bit) - 1);
            base = ((base ^ low) << 1) | low;
        }
        base
    }

    /// Base index of group `g` by depositing its bits into the free positions.
    #[inline]
    pub fn group_base_deposit(&self, group: u64) -> u64 {
        pdep(group, !self.qubit_mask & full_mask(self.num_qubits))
    }

    /// Amplitude indices of group `g`, in gate-local order.
    pub fn group(&self, group: u64) -> Vec<u64> {
        let base = self.group_base_masked(group);
        self.offsets.iter().map(|offset| base | offset).collect()
    }
}
