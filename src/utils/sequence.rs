use anyhow::{anyhow, Result};
use rand::rng;
use rand::rngs::ThreadRng;
use rand::seq::IndexedRandom;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DNA {
    A,
    C,
    G,
    T,
}

impl DNA {
    /// Convert nucleotide to its character representation.
    pub fn to_char(&self) -> char {
        match self {
            DNA::A => 'A',
            DNA::C => 'C',
            DNA::G => 'G',
            DNA::T => 'T',
        }
    }

    /// Watson-Crick complement.
    pub fn complement(&self) -> DNA {
        match self {
            DNA::A => DNA::T,
            DNA::T => DNA::A,
            DNA::C => DNA::G,
            DNA::G => DNA::C,
        }
    }

    /// Get all possible nucleotides as a static slice.
    pub fn all() -> &'static [DNA] {
        &[DNA::A, DNA::C, DNA::G, DNA::T]
    }

    /// Generate a random nucleotide using the thread-local RNG.
    #[allow(dead_code)]
    pub fn random() -> DNA {
        let mut rng = rng();

        *DNA::all()
            .choose(&mut rng)
            .expect("Nucleotide::all is never empty")
    }

    /// Generate a random sequence of nucleotides of the given length.
    pub fn random_sequence(length: usize) -> String {
        let mut rng = rng();
        (0..length)
            .map(|_| DNA::random_with_rng(&mut rng).to_char())
            .collect()
    }

    /// Helper method to generate a random nucleotide with a provided RNG.
    fn random_with_rng(rng: &mut ThreadRng) -> DNA {
        *DNA::all()
            .choose(rng)
            .expect("DNA::all is never empty")
    }
}

/// Reverse complement over the unambiguous alphabet {A,C,G,T},
/// case-insensitive. Primer sequences are validated here once at startup;
/// any other character is an error.
pub fn reverse_complement(seq: &str) -> Result<String> {
    seq.chars()
        .rev()
        .map(|c| match c.to_ascii_uppercase() {
            'A' => Ok('T'),
            'T' => Ok('A'),
            'C' => Ok('G'),
            'G' => Ok('C'),
            other => Err(anyhow!("Unsupported base '{}' in primer sequence", other)),
        })
        .collect()
}

fn phred33(score: u8) -> u8 {
    score + 33
}

fn normal_phred_qual(mean: f32, stdev: f32) -> u8 {
    let mut raw_phred = -1.0;

    let normal = Normal::new(mean, stdev).unwrap();

    while raw_phred < 0.0 || raw_phred > 40.0 {
        raw_phred = normal.sample(&mut rand::rng());
    }

    phred33(raw_phred as u8)
}

/// Phred+33 quality string with scores drawn from a normal distribution,
/// used to synthesize FASTQ test inputs.
pub fn normal_phred_qual_string(length: usize, mean: f32, stdev: f32) -> String {
    let mut quals = String::new();

    for _i in 0..length {
        quals.push(normal_phred_qual(mean, stdev) as char);
    }

    quals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_nucleotide() {
        let dna = DNA::random();
        assert!(matches!(dna, DNA::A | DNA::C | DNA::G | DNA::T));
    }

    #[test]
    fn test_random_sequence() {
        let seq = DNA::random_sequence(10);
        assert_eq!(seq.len(), 10);
        assert!(seq.chars().all(|c| "ACGT".contains(c)));
    }

    #[test]
    fn test_complement_pairs() {
        assert_eq!(DNA::A.complement(), DNA::T);
        assert_eq!(DNA::G.complement(), DNA::C);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGT").unwrap(), "ACGT");
        assert_eq!(reverse_complement("AACC").unwrap(), "GGTT");
        assert_eq!(reverse_complement("CGGTTACCTTGTTACGACTT").unwrap(), "AAGTCGTAACAAGGTAACCG");
    }

    #[test]
    fn test_reverse_complement_involution() {
        for _ in 0..20 {
            let seq = DNA::random_sequence(50);
            let twice = reverse_complement(&reverse_complement(&seq).unwrap()).unwrap();
            assert_eq!(twice, seq);
        }
    }

    #[test]
    fn test_reverse_complement_lowercase() {
        assert_eq!(reverse_complement("acgt").unwrap(), "ACGT");
    }

    #[test]
    fn test_reverse_complement_rejects_ambiguity_codes() {
        assert!(reverse_complement("ACGN").is_err());
        assert!(reverse_complement("ACGM").is_err());
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(reverse_complement("").unwrap(), "");
    }
}
