use std::fmt;

use rand::Rng;

use crate::constants::DICE_COUNT;

/// Five six-sided dice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dice {
    values: [u8; DICE_COUNT],
}

impl Dice {
    /// Dice with fixed faces; values outside 1..=6 are clamped
    pub fn from_values(values: [u8; DICE_COUNT]) -> Self {
        Self {
            values: values.map(|v| v.clamp(1, 6)),
        }
    }

    pub fn values(&self) -> [u8; DICE_COUNT] {
        self.values
    }

    /// Re-roll every die whose keep flag is false
    pub fn roll_kept<R: Rng + ?Sized>(&mut self, keep: [bool; DICE_COUNT], rng: &mut R) {
        for (value, kept) in self.values.iter_mut().zip(keep) {
            if !kept {
                *value = rng.gen_range(1..=6);
            }
        }
    }

    /// Count of dice showing `face`
    pub fn count_of(&self, face: u8) -> usize {
        self.values.iter().filter(|&&v| v == face).count()
    }

    pub fn sum(&self) -> u32 {
        self.values.iter().map(|&v| u32::from(v)).sum()
    }

    /// Per-face counts, index 0 is face 1
    pub fn face_counts(&self) -> [usize; 6] {
        let mut counts = [0; 6];
        for &v in &self.values {
            counts[usize::from(v - 1)] += 1;
        }
        counts
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self {
            values: [1; DICE_COUNT],
        }
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces: Vec<String> = self.values.iter().map(u8::to_string).collect();
        f.write_str(&faces.join(" "))
    }
}
