//! Letter catalog: the 28 letters of the Arabic alphabet in canonical order.
//!
//! Seeded once at startup and never mutated. Ids run 1..=28 and define lesson order,
//! which gating and quiz decoy selection both rely on.

use crate::domain::{LetterEntry, LetterId};
use crate::util::is_arabic;

macro_rules! letter {
  ($id:expr, $ar:expr, $name:expr, $tr:expr, $pr:expr, $word:expr, $meaning:expr, $ctx:expr, [$($q:expr),*]) => {
    LetterEntry {
      id: $id,
      arabic: $ar.into(),
      name: $name.into(),
      transliteration: $tr.into(),
      pronunciation: $pr.into(),
      example_word: $word.into(),
      example_meaning: $meaning.into(),
      islamic_context: $ctx.map(|s: &str| s.to_string()),
      quranic_examples: vec![$($q.to_string()),*],
    }
  };
}

const NONE: Option<&str> = None;

#[derive(Clone, Debug)]
pub struct Catalog {
  letters: Vec<LetterEntry>,
}

impl Catalog {
  /// Built-in alphabet.
  pub fn arabic() -> Self {
    Self { letters: arabic_alphabet() }
  }

  pub fn letters(&self) -> &[LetterEntry] {
    &self.letters
  }

  pub fn len(&self) -> usize {
    self.letters.len()
  }

  pub fn is_empty(&self) -> bool {
    self.letters.is_empty()
  }

  pub fn get(&self, id: LetterId) -> Option<&LetterEntry> {
    // Ids are dense and 1-based.
    (id as usize)
      .checked_sub(1)
      .and_then(|idx| self.letters.get(idx))
      .filter(|l| l.id == id)
  }

  pub fn contains(&self, id: LetterId) -> bool {
    self.get(id).is_some()
  }

  /// Every entry except `id`; the pool quiz decoys are drawn from.
  pub fn decoys_for(&self, id: LetterId) -> Vec<&LetterEntry> {
    self.letters.iter().filter(|l| l.id != id).collect()
  }
}

impl Default for Catalog {
  fn default() -> Self {
    Self::arabic()
  }
}

/// Check the static data: dense ascending ids and Arabic graphemes.
pub fn validate(letters: &[LetterEntry]) -> Result<(), String> {
  for (idx, l) in letters.iter().enumerate() {
    if l.id as usize != idx + 1 {
      return Err(format!("letter '{}' has id {} at position {}", l.name, l.id, idx + 1));
    }
    if !l.arabic.chars().all(is_arabic) {
      return Err(format!("letter {} grapheme '{}' is not Arabic", l.id, l.arabic));
    }
  }
  Ok(())
}

fn arabic_alphabet() -> Vec<LetterEntry> {
  vec![
    letter!(1, "ا", "Alif", "A", "alif", "أسد (asad)", "lion",
      Some("The first letter of the name of Allah (الله) and of Ahad (أحد), 'The One'."), ["الله", "أحد"]),
    letter!(2, "ب", "Ba", "B", "baa", "بيت (bayt)", "house",
      Some("Opens the Basmala: بسم الله الرحمن الرحيم."), ["بسم"]),
    letter!(3, "ت", "Ta", "T", "taa", "تفاح (tuffah)", "apple", NONE, ["توبة"]),
    letter!(4, "ث", "Tha", "TH", "thaa", "ثعلب (thalab)", "fox", NONE, ["ثواب"]),
    letter!(5, "ج", "Jeem", "J", "jeem", "جمل (jamal)", "camel",
      Some("Begins Jannah (جنة), Paradise."), ["جنة"]),
    letter!(6, "ح", "Ha", "H", "haa", "حصان (hisan)", "horse",
      Some("Begins Al-Hamd (الحمد), the praise that opens Al-Fatiha."), ["الحمد"]),
    letter!(7, "خ", "Kha", "KH", "khaa", "خروف (kharuf)", "sheep", NONE, ["خير"]),
    letter!(8, "د", "Dal", "D", "daal", "دجاج (dajaj)", "chicken", NONE, ["دين"]),
    letter!(9, "ذ", "Dhal", "DH", "dhaal", "ذئب (dheeb)", "wolf",
      Some("Begins Dhikr (ذكر), the remembrance of Allah."), ["ذكر"]),
    letter!(10, "ر", "Ra", "R", "raa", "رجل (rajul)", "man",
      Some("Begins Ar-Rahman (الرحمن), 'The Most Merciful'."), ["الرحمن", "رب"]),
    letter!(11, "ز", "Zay", "Z", "zaay", "زهرة (zahra)", "flower", NONE, ["زكاة"]),
    letter!(12, "س", "Seen", "S", "seen", "سمك (samak)", "fish",
      Some("Begins Salam (سلام), peace, and the greeting As-salamu alaykum."), ["سلام"]),
    letter!(13, "ش", "Sheen", "SH", "sheen", "شمس (shams)", "sun", NONE, ["شكر", "الشمس"]),
    letter!(14, "ص", "Sad", "S", "saad", "صقر (saqr)", "falcon",
      Some("Begins Salah (صلاة), the prayer."), ["صلاة"]),
    letter!(15, "ض", "Dad", "D", "daad", "ضفدع (difdaa)", "frog",
      Some("Arabic is called 'the language of Dad' because this sound is unique to it."), ["الضحى"]),
    letter!(16, "ط", "Ta", "T", "taa", "طائر (tair)", "bird", NONE, ["طيب"]),
    letter!(17, "ظ", "Dha", "DH", "dhaa", "ظبي (dhabi)", "deer", NONE, ["ظلم"]),
    letter!(18, "ع", "Ayn", "A", "ayn", "عين (ayn)", "eye", NONE, ["علم", "العالمين"]),
    letter!(19, "غ", "Ghayn", "GH", "ghayn", "غراب (ghurab)", "crow", NONE, ["غفور"]),
    letter!(20, "ف", "Fa", "F", "faa", "فيل (feel)", "elephant",
      Some("Begins Al-Fatiha (الفاتحة), the opening chapter."), ["الفاتحة", "الفلق"]),
    letter!(21, "ق", "Qaf", "Q", "qaaf", "قطة (qittah)", "cat",
      Some("Begins Qur'an (قرآن)."), ["قرآن", "قل"]),
    letter!(22, "ك", "Kaf", "K", "kaaf", "كلب (kalb)", "dog", NONE, ["كتاب"]),
    letter!(23, "ل", "Lam", "L", "laam", "ليمون (laymun)", "lemon", NONE, ["ليل"]),
    letter!(24, "م", "Meem", "M", "meem", "ماء (maa)", "water",
      Some("Begins Masjid (مسجد), the mosque, and Muhammad (محمد) ﷺ."), ["مسجد", "ملك"]),
    letter!(25, "ن", "Noon", "N", "noon", "نار (naar)", "fire", NONE, ["نور", "الناس"]),
    letter!(26, "ه", "Ha", "H", "haa", "هلال (hilal)", "crescent",
      Some("Begins Huda (هدى), guidance."), ["هدى"]),
    letter!(27, "و", "Waw", "W", "waaw", "ورد (ward)", "rose", NONE, ["وضوء"]),
    letter!(28, "ي", "Ya", "Y", "yaa", "يد (yad)", "hand", NONE, ["يوم", "يا أيها"]),
  ]
}
