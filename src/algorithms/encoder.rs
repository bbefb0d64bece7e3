//! Item feature encoding: one-hot categoricals, a standardised year column and
//! a TF-IDF block over the display name, concatenated into sparse rows.

use crate::config::ContentConfig;
use crate::models::{Catalog, CatalogItem, CATEGORICAL_FIELDS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

/// English stop words, the list scikit-learn ships.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amoungst",
    "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere",
    "are", "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during",
    "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen", "fifty",
    "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found", "four",
    "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have", "he",
    "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him",
    "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
    "interest", "into", "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least",
    "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "sincere", "six",
    "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "thick", "thin", "third", "this", "those", "though", "three", "through",
    "throughout", "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve",
    "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

/// Sparse row: strictly increasing column indices with their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Builds a vector from unordered `(column, value)` entries. Zero values are dropped
    /// and repeated columns are summed.
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for (col, value) in entries {
            *merged.entry(col).or_insert(0.0) += value;
        }
        let (indices, values) = merged.into_iter().filter(|(_, v)| *v != 0.0).unzip();
        Self { indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, col: usize) -> f64 {
        self.indices
            .binary_search(&col)
            .map_or(0.0, |pos| self.values[pos])
    }

    /// Merge-join dot product. Commutative bit for bit.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Encoded catalog: one sparse row per catalog item, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<SparseVector>,
    width: usize,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<SparseVector>, width: usize) -> Self {
        Self { rows, width }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.width)
    }

    pub fn row(&self, row: usize) -> Option<&SparseVector> {
        self.rows.get(row)
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVector::nnz).sum()
    }

    /// Fraction of zero cells.
    pub fn sparsity(&self) -> f64 {
        let cells = self.rows.len() * self.width;
        if cells == 0 {
            return 0.0;
        }
        1.0 - self.nnz() as f64 / cells as f64
    }
}

/// Sorted levels per categorical field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    levels: Vec<Vec<String>>,
    offsets: Vec<usize>,
}

impl OneHotEncoder {
    pub fn fit(items: &[CatalogItem]) -> Self {
        let mut levels: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); CATEGORICAL_FIELDS.len()];
        for item in items {
            for (field, value) in item.categorical_values().into_iter().enumerate() {
                levels[field].insert(value);
            }
        }
        let levels: Vec<Vec<String>> = levels
            .into_iter()
            .map(|set| set.into_iter().map(str::to_string).collect())
            .collect();

        let mut offsets = Vec::with_capacity(levels.len());
        let mut offset = 0;
        for field in &levels {
            offsets.push(offset);
            offset += field.len();
        }
        Self { levels, offsets }
    }

    pub fn width(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Active column per field; a level unseen at fit time contributes nothing.
    pub fn transform(&self, values: [&str; 7]) -> Vec<usize> {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(field, value)| {
                let level = self.levels[field]
                    .binary_search_by(|probe| probe.as_str().cmp(value))
                    .ok()?;
                Some(self.offsets[field] + level)
            })
            .collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        CATEGORICAL_FIELDS
            .iter()
            .zip(&self.levels)
            .flat_map(|(field, levels)| levels.iter().map(move |level| format!("{}_{}", field, level)))
            .collect()
    }

    pub fn distinct_levels(&self, field: usize) -> usize {
        self.levels.get(field).map_or(0, Vec::len)
    }
}

/// Zero mean, unit variance; population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub scale: f64,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self { mean: 0.0, scale: 1.0 }
    }
}

impl StandardScaler {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            mean,
            scale: if std > 0.0 { std } else { 1.0 },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Alphabetical vocabulary; a term's position is its column.
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    ngram_max: usize,
    use_stop_words: bool,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl TfidfVectorizer {
    pub fn fit(documents: &[&str], config: &ContentConfig) -> Self {
        let stop_words = stop_word_set(config.use_stop_words);
        let ngram_max = config.ngram_max.max(1);
        let n_docs = documents.len();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let terms = analyze(doc, &stop_words, ngram_max);
            let mut seen: HashSet<&str> = HashSet::new();
            for term in &terms {
                *term_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        let max_doc_count = config.max_df * n_docs as f64;
        let mut candidates: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= config.min_df && df as f64 <= max_doc_count)
            .map(|(term, _)| (term.clone(), term_freq[term]))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(config.max_text_features);

        let mut vocabulary: Vec<String> = candidates.into_iter().map(|(term, _)| term).collect();
        vocabulary.sort();
        if vocabulary.is_empty() {
            warn!(documents = n_docs, "Text vocabulary is empty after document-frequency pruning");
        }

        let idf = vocabulary
            .iter()
            .map(|term| ((1.0 + n_docs as f64) / (1.0 + doc_freq[term] as f64)).ln() + 1.0)
            .collect();

        let mut vectorizer = Self {
            vocabulary,
            idf,
            ngram_max,
            use_stop_words: config.use_stop_words,
            lookup: HashMap::new(),
        };
        vectorizer.rebuild_lookup();
        vectorizer
    }

    /// Restores the term lookup after deserialisation.
    pub fn rebuild_lookup(&mut self) {
        self.lookup = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(col, term)| (term.clone(), col))
            .collect();
    }

    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// L2-normalised tf-idf entries for one document, ordered by column.
    pub fn transform(&self, document: &str) -> Vec<(usize, f64)> {
        let stop_words = stop_word_set(self.use_stop_words);
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in analyze(document, &stop_words, self.ngram_max) {
            if let Some(&col) = self.lookup.get(&term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }
        let mut weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();
        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weighted {
                *w /= norm;
            }
        }
        weighted
    }
}

fn stop_word_set(enabled: bool) -> HashSet<&'static str> {
    if enabled {
        STOP_WORDS.iter().copied().collect()
    } else {
        HashSet::new()
    }
}

/// Lower-cased word tokens of two or more characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn analyze(text: &str, stop_words: &HashSet<&str>, ngram_max: usize) -> Vec<String> {
    let tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|token| !stop_words.contains(token.as_str()))
        .collect();
    let mut terms = tokens.clone();
    for n in 2..=ngram_max {
        terms.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    terms
}

/// Which block a feature column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureBlock {
    Categorical,
    Numerical,
    Text,
}

/// Fitted encoder for the full item row: `[one-hot | year | tf-idf]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    categorical: OneHotEncoder,
    year: StandardScaler,
    text: TfidfVectorizer,
}

impl FeatureEncoder {
    pub fn fit(catalog: &Catalog, config: &ContentConfig) -> Self {
        let items = catalog.items();
        let categorical = OneHotEncoder::fit(items);
        let years: Vec<f64> = items.iter().map(|item| item.year as f64).collect();
        let year = StandardScaler::fit(&years);
        let names: Vec<&str> = items.iter().map(|item| item.product_display_name.as_str()).collect();
        let text = TfidfVectorizer::fit(&names, config);

        info!(
            categorical = categorical.width(),
            text = text.width(),
            "Feature encoder fitted"
        );
        Self {
            categorical,
            year,
            text,
        }
    }

    pub fn fit_transform(catalog: &Catalog, config: &ContentConfig) -> (Self, FeatureMatrix) {
        let encoder = Self::fit(catalog, config);
        let rows = catalog.items().iter().map(|item| encoder.transform(item)).collect();
        let matrix = FeatureMatrix::new(rows, encoder.width());
        (encoder, matrix)
    }

    pub fn transform(&self, item: &CatalogItem) -> SparseVector {
        let year_col = self.categorical.width();
        let text_offset = year_col + 1;

        let categorical = self
            .categorical
            .transform(item.categorical_values())
            .into_iter()
            .map(|col| (col, 1.0));
        let year = std::iter::once((year_col, self.year.transform(item.year as f64)));
        let text = self
            .text
            .transform(&item.product_display_name)
            .into_iter()
            .map(|(col, value)| (text_offset + col, value));

        SparseVector::from_entries(categorical.chain(year).chain(text))
    }

    pub fn width(&self) -> usize {
        self.categorical.width() + 1 + self.text.width()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.categorical.feature_names();
        names.push("year".to_string());
        names.extend(self.text.vocabulary().iter().cloned());
        names
    }

    pub fn block_of(&self, col: usize) -> FeatureBlock {
        let categorical = self.categorical.width();
        if col < categorical {
            FeatureBlock::Categorical
        } else if col == categorical {
            FeatureBlock::Numerical
        } else {
            FeatureBlock::Text
        }
    }

    pub fn categorical(&self) -> &OneHotEncoder {
        &self.categorical
    }

    pub fn rebuild_lookup(&mut self) {
        self.text.rebuild_lookup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemId;

    fn item(id: ItemId, colour: &str, year: i32, name: &str) -> CatalogItem {
        CatalogItem {
            id,
            gender: "Men".to_string(),
            master_category: "Apparel".to_string(),
            sub_category: "Topwear".to_string(),
            article_type: "Tshirts".to_string(),
            base_colour: colour.to_string(),
            season: "Summer".to_string(),
            usage: "Casual".to_string(),
            year,
            product_display_name: name.to_string(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            item(1, "Blue", 2011, "Nike Men Blue Tshirt"),
            item(2, "Red", 2012, "Nike Men Red Tshirt"),
            item(3, "Blue", 2013, "Puma Men Blue Shirt"),
            item(4, "Black", 2012, "Puma Men Black Shirt"),
            item(5, "Black", 2012, "Adidas Women Shoes"),
        ])
    }

    #[test]
    fn test_tokenize_drops_single_characters() {
        assert_eq!(tokenize("A T-shirt for Men_s!"), vec!["shirt", "for", "men_s"]);
    }

    #[test]
    fn test_tfidf_vocabulary_pruning() {
        let config = ContentConfig::default();
        let docs = ["nike blue tshirt", "nike red tshirt", "puma blue shirt", "puma black"];
        let tfidf = TfidfVectorizer::fit(&docs, &config);
        // "tshirt", "nike", "puma", "blue", "nike tshirt"... appear in two docs; singletons vanish
        assert!(tfidf.vocabulary().contains(&"nike".to_string()));
        assert!(!tfidf.vocabulary().contains(&"red".to_string()));
        assert!(tfidf.vocabulary().windows(2).all(|w| w[0] < w[1]));

        let row = tfidf.transform("Nike blue");
        let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(tfidf.transform("completely unseen").is_empty());
    }

    #[test]
    fn test_max_df_drops_ubiquitous_terms() {
        let config = ContentConfig::default();
        let docs = ["shirt blue", "shirt red", "shirt blue", "shirt red", "shirt green"];
        let tfidf = TfidfVectorizer::fit(&docs, &config);
        assert!(!tfidf.vocabulary().contains(&"shirt".to_string()));
        assert!(tfidf.vocabulary().contains(&"blue".to_string()));
    }

    #[test]
    fn test_empty_vocabulary_is_allowed() {
        let config = ContentConfig::default();
        let tfidf = TfidfVectorizer::fit(&["alpha", "beta"], &config);
        assert_eq!(tfidf.width(), 0);
    }

    #[test]
    fn test_scaler_handles_constant_column() {
        let scaler = StandardScaler::fit(&[2012.0, 2012.0]);
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.transform(2012.0), 0.0);

        let scaler = StandardScaler::fit(&[1.0, 3.0]);
        assert_eq!(scaler.mean, 2.0);
        assert_eq!(scaler.transform(3.0), 1.0);
    }

    #[test]
    fn test_row_layout_and_unknown_levels() {
        let catalog = catalog();
        let (encoder, matrix) = FeatureEncoder::fit_transform(&catalog, &ContentConfig::default());
        assert_eq!(matrix.shape(), (5, encoder.width()));
        assert_eq!(encoder.feature_names().len(), encoder.width());

        let names = encoder.feature_names();
        let blue = names.iter().position(|n| n == "baseColour_Blue").unwrap();
        assert_eq!(matrix.row(0).unwrap().get(blue), 1.0);
        assert_eq!(encoder.block_of(blue), FeatureBlock::Categorical);
        assert_eq!(encoder.block_of(encoder.categorical().width()), FeatureBlock::Numerical);

        let mut unseen = item(9, "Magenta", 2012, "Nike");
        unseen.gender = "Unisex".to_string();
        let row = encoder.transform(&unseen);
        let categorical_active = row
            .iter()
            .filter(|(col, _)| encoder.block_of(*col) == FeatureBlock::Categorical)
            .count();
        assert_eq!(categorical_active, 5);
    }

    #[test]
    fn test_sparse_dot_is_symmetric() {
        let a = SparseVector::from_entries(vec![(3, 0.5), (1, 2.0), (7, 1.0)]);
        let b = SparseVector::from_entries(vec![(1, 1.5), (7, -1.0), (9, 4.0)]);
        assert_eq!(a.dot(&b), b.dot(&a));
        assert_eq!(a.dot(&b), 2.0);
        assert_eq!(a.nnz(), 3);
    }
}
