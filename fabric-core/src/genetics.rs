//! Dice genes and the readers that turn them into choices.
//!
//! A [`Gene`] is an append-only run of die rolls. A [`GeneReader`] walks a
//! gene from the start, rolling new dice only when it runs off the end, so
//! reading the same prefix twice always gives the same choices.

use std::{collections::BTreeMap, fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FabricError, Result};

const SYMBOLS: [char; 6] = ['⚀', '⚁', '⚂', '⚃', '⚄', '⚅'];

/// One die showing 1 to 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Die(u8);

impl Die {
    pub const ONE: Die = Die(1);
    pub const SIX: Die = Die(6);

    /// `None` unless `face` is 1 to 6.
    pub fn new(face: u8) -> Option<Self> {
        (1..=6).contains(&face).then_some(Die(face))
    }

    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Die(rng.random_range(1..=6))
    }

    #[inline]
    pub fn face(self) -> u8 {
        self.0
    }

    /// Zero-based value, the die's weight as a base-6 digit.
    #[inline]
    pub fn index(self) -> u8 {
        self.0 - 1
    }

    pub fn symbol(self) -> char {
        SYMBOLS[self.index() as usize]
    }

    /// Accepts both the die symbol and its numeral.
    pub fn from_symbol(c: char) -> Option<Self> {
        if let Some(i) = SYMBOLS.iter().position(|&s| s == c) {
            return Some(Die(i as u8 + 1));
        }
        c.to_digit(10).and_then(|d| Die::new(d as u8))
    }
}

/// Maps dice to a fraction in `(0, 1)`.
///
/// The dice are read as base-6 digits, first die most significant, and
/// the result is taken from the middle of its bin, so `[⚀]` gives `1/12`
/// and `[⚅]` gives `11/12`.
///
/// ### Panics
/// Panics on an empty slice.
pub fn dice_to_nuance(dice: &[Die]) -> f64 {
    assert!(!dice.is_empty(), "no dice to read");
    let value = dice
        .iter()
        .fold(0.0_f64, |sum, die| sum * 6.0 + die.index() as f64);
    (value + 0.5) / 6f64.powi(dice.len() as i32)
}

/// Smallest number of dice whose combinations cover `max_choice` outcomes.
fn dice_needed(max_choice: u32) -> usize {
    let mut dice = 1;
    let mut outcomes: u64 = 6;
    while outcomes < max_choice as u64 {
        outcomes *= 6;
        dice += 1;
    }
    dice
}

/// An append-only die sequence plus how often it has been mutated.
///
/// Serialises as its string of die symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gene {
    dice: Vec<Die>,
    mutations: u32,
}

impl Gene {
    pub fn from_dice(dice: Vec<Die>) -> Self {
        Self { dice, mutations: 0 }
    }

    pub fn dice(&self) -> &[Die] {
        &self.dice
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    pub fn mutations(&self) -> u32 {
        self.mutations
    }

    /// Rerolls one die until it shows something new. An empty gene gets
    /// its first die instead.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.dice.is_empty() {
            self.dice.push(Die::roll(rng));
        } else {
            let which = rng.random_range(0..self.dice.len());
            let before = self.dice[which];
            while self.dice[which] == before {
                self.dice[which] = Die::roll(rng);
            }
        }
        self.mutations += 1;
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dice.iter().try_for_each(|die| write!(f, "{}", die.symbol()))
    }
}

impl FromStr for Gene {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .enumerate()
            .map(|(i, c)| {
                Die::from_symbol(c)
                    .ok_or_else(|| FabricError::gene(format!("position {i} holds {c:?}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Gene::from_dice)
    }
}

impl Serialize for Gene {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Gene {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Reads choices from a gene, extending it with fresh rolls on demand.
pub struct GeneReader<'a, R> {
    gene: &'a mut Gene,
    roll: R,
    cursor: usize,
}

impl<'a, R: FnMut() -> Die> GeneReader<'a, R> {
    pub fn new(gene: &'a mut Gene, roll: R) -> Self {
        Self {
            gene,
            roll,
            cursor: 0,
        }
    }

    /// Dice consumed so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn next_die(&mut self) -> Die {
        while self.gene.dice.len() <= self.cursor {
            self.gene.dice.push((self.roll)());
        }
        let die = self.gene.dice[self.cursor];
        self.cursor += 1;
        die
    }

    /// A choice in `0..max_choice`, read from as few dice as can cover it.
    ///
    /// ### Panics
    /// Panics if `max_choice` is zero.
    pub fn choose_from(&mut self, max_choice: u32) -> u32 {
        assert!(max_choice > 0, "cannot choose from zero options");
        let dice: Vec<Die> = (0..dice_needed(max_choice))
            .map(|_| self.next_die())
            .collect();
        let choice = (dice_to_nuance(&dice) * max_choice as f64).floor() as u32;
        choice.min(max_choice - 1)
    }
}

/// What a gene is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneName {
    Growth,
    Forward,
    Left,
    Right,
}

/// A set of named genes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    genes: BTreeMap<GeneName, Gene>,
}

impl Genome {
    pub fn gene(&self, name: GeneName) -> Option<&Gene> {
        self.genes.get(&name)
    }

    pub fn insert(&mut self, name: GeneName, gene: Gene) {
        self.genes.insert(name, gene);
    }

    /// Reader over the named gene, which is created empty if missing.
    /// New dice come from `rng`.
    pub fn create_reader<'a, G: Rng + ?Sized>(
        &'a mut self,
        name: GeneName,
        rng: &'a mut G,
    ) -> GeneReader<'a, impl FnMut() -> Die + 'a> {
        let gene = self.genes.entry(name).or_default();
        GeneReader::new(gene, move || Die::roll(&mut *rng))
    }

    /// Copy of this genome with one mutation in each named gene.
    pub fn with_mutations<G: Rng + ?Sized>(&self, names: &[GeneName], rng: &mut G) -> Genome {
        let mut copy = self.clone();
        for &name in names {
            copy.genes.entry(name).or_default().mutate(rng);
        }
        copy
    }

    /// Highest mutation count among the genes.
    pub fn generation(&self) -> u32 {
        self.genes.values().map(Gene::mutations).max().unwrap_or(0)
    }
}
