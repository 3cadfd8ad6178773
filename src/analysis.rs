//! Output-quality metrics over single-bit input changes.
//!
//! A fixed random 256-bit input is hashed once per bit position with that bit
//! flipped, and the digest bits are compared against the flipped input. The
//! diffusion index is 1 when about half the bits differ; the D-L ratio is the
//! Damerau-Levenshtein distance between the two bit strings over their length.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithms::HashScheme;

pub const INPUT_BITS: usize = 256;
pub const DEFAULT_SEED: u64 = 1337;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Metric {
    #[value(name = "diffusion")]
    Diffusion,
    #[value(name = "dl-distance")]
    DlDistance,
}

impl Metric {
    pub fn title(self) -> &'static str {
        match self {
            Self::Diffusion => "Diffusion index",
            Self::DlDistance => "D-L distance",
        }
    }

    pub fn score_column(self) -> &'static str {
        match self {
            Self::Diffusion => "Score",
            Self::DlDistance => "D-L Ratio",
        }
    }
}

pub fn random_bits(seed: u64, len: usize) -> Vec<bool> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_bool(0.5)).collect()
}

/// `"0100..."`, most significant bit first, whole bytes only.
pub fn parse_bitstring(text: &str) -> Result<Vec<u8>> {
    if text.len() % 8 != 0 {
        bail!("bitstring length {} is not a multiple of 8", text.len());
    }
    let bits = text
        .bytes()
        .enumerate()
        .map(|(idx, ch)| -> Result<bool> {
            match ch {
                b'0' => Ok(false),
                b'1' => Ok(true),
                other => bail!(
                    "bitstring has {:?} at position {idx}; only 0 and 1 are allowed",
                    other as char
                ),
            }
        })
        .collect::<Result<Vec<bool>>>()?;
    Ok(bits_to_bytes(&bits))
}

pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (idx, bit)| byte | (u8::from(*bit) << (7 - idx)))
        })
        .collect()
}

/// Exactly `width` bits, MSB first; short input is zero-padded.
pub fn bytes_to_bits(bytes: &[u8], width: usize) -> Vec<bool> {
    let mut bits: Vec<bool> = bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
        .take(width)
        .collect();
    bits.resize(width, false);
    bits
}

/// `1 - (d - n/2) / (n/2)` where `d` counts differing positions.
pub fn diffusion_index(a: &[bool], b: &[bool]) -> Result<f64> {
    if a.len() != b.len() || a.is_empty() {
        bail!(
            "diffusion needs two equal non-empty bit strings, got {} and {}",
            a.len(),
            b.len()
        );
    }
    let n = a.len() as f64;
    let d = a.iter().zip(b).filter(|(x, y)| x != y).count() as f64;
    let half = n / 2.0;
    Ok(1.0 - (d - half) / half)
}

/// Optimal-string-alignment Damerau-Levenshtein distance.
pub fn damerau_levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (rows, cols) = (a.len() + 1, b.len() + 1);
    let mut d = vec![vec![0usize; cols]; rows];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in d[0].iter_mut().enumerate() {
        *cell = j;
    }
    for i in 1..rows {
        for j in 1..cols {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[i - 1][j] + 1)
                .min(d[i][j - 1] + 1)
                .min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[i - 2][j - 2] + cost);
            }
            d[i][j] = best;
        }
    }
    d[a.len()][b.len()]
}

/// Averages `metric` over `trials` single-bit flips of `base`.
pub fn score(scheme: &dyn HashScheme, metric: Metric, base: &[bool], trials: usize) -> Result<f64> {
    if trials == 0 || trials > base.len() {
        bail!(
            "trials must be in 1..={} for a {}-bit input, got {trials}",
            base.len(),
            base.len()
        );
    }
    let mut total = 0.0;
    for idx in 0..trials {
        let mut flipped = base.to_vec();
        flipped[idx] = !flipped[idx];
        let input = bits_to_bytes(&flipped);
        let digest = scheme
            .hash_raw(&input)
            .with_context(|| format!("{}: hashing failed for flip {idx}", scheme.name()))?;
        let digest_bits = bytes_to_bits(&digest, flipped.len());
        total += match metric {
            Metric::Diffusion => diffusion_index(&flipped, &digest_bits)?,
            Metric::DlDistance => {
                damerau_levenshtein(&flipped, &digest_bits) as f64 / flipped.len() as f64
            }
        };
    }
    Ok(total / trials as f64)
}
