//! The exercise rule catalog.
//!
//! A catalog is built once from a rule document and is immutable afterwards.
//! Sessions hold it behind an `Arc`, so any number of sessions (or tests)
//! can share one catalog or use independent ones.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use formcoach_core::{Error, Result, ViolationType};
use parking_lot::Mutex;
use serde::Serialize;

use crate::document::RuleDocument;
use crate::fallback;
use crate::matcher::{normalize, similarity, MatchThresholds};
use crate::model::{ExerciseCategory, ExerciseFormRules, ExerciseType, ViolationInfo};

/// Default rule document compiled into the crate
pub const BUNDLED_RULES: &str = include_str!("../assets/exercise_rules.json");

/// A catalog entry that matched a looked-up name
#[derive(Debug, Clone)]
pub struct ExerciseMatch {
    pub rules: Arc<ExerciseFormRules>,
    /// The catalog name or alias that scored best
    pub matched_name: String,
    /// Similarity in [0, 100]
    pub confidence: f64,
    pub is_exact_match: bool,
}

/// How a session's rules were obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchSource {
    Exact,
    Fuzzy { matched_name: String, confidence: f64 },
    Fallback { category: ExerciseCategory },
}

#[derive(Debug, Clone)]
pub struct ResolvedExercise {
    pub requested_name: String,
    pub rules: Arc<ExerciseFormRules>,
    pub source: MatchSource,
}

impl ResolvedExercise {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, MatchSource::Fallback { .. })
    }
}

/// Aggregate counts over the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total_exercises: usize,
    pub total_aliases: usize,
    pub total_angle_rules: usize,
    pub total_alignment_rules: usize,
    pub by_category: BTreeMap<ExerciseCategory, usize>,
    pub by_type: BTreeMap<ExerciseType, usize>,
}

struct NameEntry {
    normalized: String,
    display: String,
    exercise: usize,
}

pub struct RuleCatalog {
    exercises: Vec<Arc<ExerciseFormRules>>,
    by_id: HashMap<String, usize>,
    names: Vec<NameEntry>,
    violation_info: HashMap<ViolationType, ViolationInfo>,
    thresholds: MatchThresholds,
}

impl RuleCatalog {
    /// Build a catalog from already-parsed rules, validating each one
    pub fn from_rules(
        rules: Vec<ExerciseFormRules>,
        violation_info: HashMap<ViolationType, ViolationInfo>,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(rules.len());
        let mut names = Vec::new();
        let mut exercises = Vec::with_capacity(rules.len());

        for (idx, rule) in rules.into_iter().enumerate() {
            rule.validate()?;
            if by_id.insert(rule.id.clone(), idx).is_some() {
                return Err(Error::DataFormat(format!("duplicate exercise id '{}'", rule.id)));
            }
            for name in rule.names() {
                let normalized = normalize(name);
                if !normalized.is_empty() {
                    names.push(NameEntry {
                        normalized,
                        display: name.to_string(),
                        exercise: idx,
                    });
                }
            }
            exercises.push(Arc::new(rule));
        }

        Ok(Self {
            exercises,
            by_id,
            names,
            violation_info,
            thresholds: MatchThresholds::default(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let (rules, dictionary) = RuleDocument::parse(json)?.into_rules()?;
        let catalog = Self::from_rules(rules, dictionary)?;
        tracing::info!(
            "Loaded rule catalog: {} exercises, {} violation types",
            catalog.len(),
            catalog.violation_info.len()
        );
        Ok(catalog)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let json = std::fs::read_to_string(&path).map_err(|e| {
            Error::DataFormat(format!("cannot read rule document {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_RULES)
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn exercises(&self) -> impl Iterator<Item = &Arc<ExerciseFormRules>> {
        self.exercises.iter()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ExerciseFormRules>> {
        self.by_id.get(id).map(|&idx| self.exercises[idx].clone())
    }

    pub fn violation_info(&self, violation_type: ViolationType) -> Option<&ViolationInfo> {
        self.violation_info.get(&violation_type)
    }

    /// Best score per exercise, in catalog order
    fn score_all(&self, normalized_query: &str) -> Vec<ExerciseMatch> {
        let mut best: Vec<Option<(f64, &NameEntry)>> = vec![None; self.exercises.len()];

        for entry in &self.names {
            let score = similarity(normalized_query, &entry.normalized);
            let slot = &mut best[entry.exercise];
            if slot.map_or(true, |(s, _)| score > s) {
                *slot = Some((score, entry));
            }
        }

        best.into_iter()
            .flatten()
            .map(|(score, entry)| ExerciseMatch {
                rules: self.exercises[entry.exercise].clone(),
                matched_name: entry.display.clone(),
                confidence: score,
                is_exact_match: entry.normalized == normalized_query,
            })
            .collect()
    }

    /// Best match scoring at least `floor`. An exact normalized hit on a name
    /// or alias returns immediately with confidence 100.
    pub fn find_best_match(&self, name: &str, floor: f64) -> Option<ExerciseMatch> {
        let query = normalize(name);
        if query.is_empty() {
            return None;
        }

        if let Some(entry) = self.names.iter().find(|e| e.normalized == query) {
            return Some(ExerciseMatch {
                rules: self.exercises[entry.exercise].clone(),
                matched_name: entry.display.clone(),
                confidence: 100.0,
                is_exact_match: true,
            });
        }

        self.score_all(&query)
            .into_iter()
            .filter(|m| m.confidence >= floor)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Primary lookup, floor [`MatchThresholds::primary`]
    pub fn find_exercise_by_name(&self, name: &str) -> Option<ExerciseMatch> {
        self.find_best_match(name, self.thresholds.primary)
    }

    /// Confidence-reporting lookup, floor [`MatchThresholds::with_confidence`]
    pub fn find_with_confidence(&self, name: &str) -> Option<ExerciseMatch> {
        self.find_best_match(name, self.thresholds.with_confidence)
    }

    /// All candidates at or above the suggestion floor, best first, at most `limit`
    pub fn find_all_matches(&self, name: &str, limit: usize) -> Vec<ExerciseMatch> {
        let query = normalize(name);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut matches: Vec<ExerciseMatch> = self
            .score_all(&query)
            .into_iter()
            .filter(|m| m.confidence >= self.thresholds.suggestion)
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches.truncate(limit);
        matches
    }

    /// "Did you mean" names for a query that did not match exactly
    pub fn suggest_corrections(&self, name: &str, limit: usize) -> Vec<String> {
        self.find_all_matches(name, limit)
            .into_iter()
            .filter(|m| !m.is_exact_match)
            .map(|m| m.rules.name.clone())
            .collect()
    }

    /// Synthesized rules for a name with no catalog entry. Always succeeds
    /// unless the synthesized rule set is itself invalid.
    pub fn get_fallback_rules(&self, name: &str) -> Result<ExerciseFormRules> {
        let rules = fallback::synthesize(name);
        rules.validate()?;
        Ok(rules)
    }

    /// Catalog entry for `name` if one clears the primary floor, otherwise
    /// fallback rules
    pub fn resolve(&self, name: &str) -> Result<ResolvedExercise> {
        self.resolve_with(name, &self.thresholds)
    }

    /// [`resolve`](Self::resolve) against caller-supplied floors instead of
    /// the catalog's own
    pub fn resolve_with(&self, name: &str, thresholds: &MatchThresholds) -> Result<ResolvedExercise> {
        if let Some(found) = self.find_best_match(name, thresholds.primary) {
            let source = if found.is_exact_match {
                MatchSource::Exact
            } else {
                tracing::info!(
                    "Resolved '{}' to '{}' (similarity {:.1})",
                    name,
                    found.rules.name,
                    found.confidence
                );
                MatchSource::Fuzzy {
                    matched_name: found.matched_name,
                    confidence: found.confidence,
                }
            };
            return Ok(ResolvedExercise {
                requested_name: name.to_string(),
                rules: found.rules,
                source,
            });
        }

        let rules = self.get_fallback_rules(name)?;
        tracing::warn!(
            "No catalog entry for '{}', using {} fallback rules",
            name,
            rules.category
        );
        Ok(ResolvedExercise {
            requested_name: name.to_string(),
            source: MatchSource::Fallback {
                category: rules.category,
            },
            rules: Arc::new(rules),
        })
    }

    /// Categories present in the catalog
    pub fn categories(&self) -> Vec<ExerciseCategory> {
        let mut categories: Vec<ExerciseCategory> =
            self.exercises.iter().map(|e| e.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn by_category(&self) -> BTreeMap<ExerciseCategory, Vec<Arc<ExerciseFormRules>>> {
        let mut groups: BTreeMap<ExerciseCategory, Vec<Arc<ExerciseFormRules>>> = BTreeMap::new();
        for exercise in &self.exercises {
            groups.entry(exercise.category).or_default().push(exercise.clone());
        }
        groups
    }

    pub fn exercises_in(&self, category: ExerciseCategory) -> Vec<Arc<ExerciseFormRules>> {
        self.exercises
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Exercises whose id, name, alias, category or type contains `keyword`
    pub fn search(&self, keyword: &str) -> Vec<Arc<ExerciseFormRules>> {
        let needle = normalize(keyword);
        if needle.is_empty() {
            return Vec::new();
        }
        self.exercises
            .iter()
            .filter(|e| {
                e.names().any(|n| normalize(n).contains(&needle))
                    || normalize(&e.id.replace('_', " ")).contains(&needle)
                    || e.category.as_str().replace('_', " ").contains(&needle)
                    || e.exercise_type.as_str().replace('_', " ").contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total_exercises: self.exercises.len(),
            ..Default::default()
        };
        for exercise in &self.exercises {
            stats.total_aliases += exercise.aliases.len();
            stats.total_angle_rules += exercise.angle_rules.len();
            stats.total_alignment_rules += exercise.alignment_rules.len();
            *stats.by_category.entry(exercise.category).or_default() += 1;
            *stats.by_type.entry(exercise.exercise_type).or_default() += 1;
        }
        stats
    }
}

/// Where a catalog's rule document comes from
#[derive(Debug, Clone)]
pub enum RuleSource {
    Json(String),
    File(PathBuf),
    Bundled,
}

/// Loads a catalog at most once and hands out the shared instance
pub struct CatalogLoader {
    source: RuleSource,
    thresholds: MatchThresholds,
    loaded: Mutex<Option<Arc<RuleCatalog>>>,
}

impl CatalogLoader {
    pub fn new(source: RuleSource) -> Self {
        Self {
            source,
            thresholds: MatchThresholds::default(),
            loaded: Mutex::new(None),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Parse the document on first call; later calls return the same catalog.
    /// A failed load leaves the loader empty so it can be retried.
    pub fn load(&self) -> Result<Arc<RuleCatalog>> {
        let mut slot = self.loaded.lock();
        if let Some(catalog) = slot.as_ref() {
            return Ok(catalog.clone());
        }

        let catalog = match &self.source {
            RuleSource::Json(json) => RuleCatalog::from_json(json)?,
            RuleSource::File(path) => RuleCatalog::from_file(path.clone())?,
            RuleSource::Bundled => RuleCatalog::bundled()?,
        }
        .with_thresholds(self.thresholds);

        let catalog = Arc::new(catalog);
        *slot = Some(catalog.clone());
        Ok(catalog)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }

    pub fn catalog(&self) -> Option<Arc<RuleCatalog>> {
        self.loaded.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepDirection;

    fn catalog() -> RuleCatalog {
        RuleCatalog::bundled().expect("bundled rules must load")
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = catalog();
        assert!(catalog.len() >= 10);
        assert!(catalog.get("barbell_squat").is_some());
        assert!(catalog.violation_info(ViolationType::KneeCave).is_some());
    }

    #[test]
    fn test_exact_match() {
        let found = catalog().find_exercise_by_name("Barbell Squat").unwrap();
        assert_eq!(found.rules.id, "barbell_squat");
        assert_eq!(found.confidence, 100.0);
        assert!(found.is_exact_match);
    }

    #[test]
    fn test_alias_match_is_exact() {
        let found = catalog().find_exercise_by_name("  back SQUAT ").unwrap();
        assert_eq!(found.rules.id, "barbell_squat");
        assert!(found.is_exact_match);
        assert_eq!(found.matched_name, "back squat");
    }

    #[test]
    fn test_typo_match() {
        let found = catalog().find_exercise_by_name("Barrbell Squat").unwrap();
        assert_eq!(found.rules.id, "barbell_squat");
        assert!(!found.is_exact_match);
        assert!(found.confidence >= 60.0);
    }

    #[test]
    fn test_floors() {
        let catalog = catalog();
        assert!(catalog.find_exercise_by_name("zzzz qqqq").is_none());
        assert!(catalog.find_exercise_by_name("").is_none());

        let strict = RuleCatalog::bundled().unwrap().with_thresholds(MatchThresholds {
            primary: 99.0,
            ..Default::default()
        });
        assert!(strict.find_exercise_by_name("Barrbell Squat").is_none());
        assert!(strict.find_with_confidence("Barrbell Squat").is_some());
    }

    #[test]
    fn test_find_all_matches_ranked() {
        let matches = catalog().find_all_matches("squat", 3);
        assert!(!matches.is_empty() && matches.len() <= 3);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert!(matches.iter().all(|m| m.confidence >= 40.0));
    }

    #[test]
    fn test_suggest_corrections() {
        let suggestions = catalog().suggest_corrections("Bench Pres", 3);
        assert_eq!(suggestions.first().map(String::as_str), Some("Bench Press"));
        assert!(catalog().suggest_corrections("Bench Press", 3).iter().all(|s| s != "Bench Press"));
    }

    #[test]
    fn test_resolve_sources() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("Barbell Squat").unwrap().source, MatchSource::Exact);
        assert!(matches!(
            catalog.resolve("Barrbell Squat").unwrap().source,
            MatchSource::Fuzzy { .. }
        ));

        let resolved = catalog.resolve("Zercher Good Morning").unwrap();
        assert!(resolved.is_fallback());
        assert_eq!(resolved.rules.category, ExerciseCategory::Hinge);
        assert_eq!(resolved.rules.rep_detection.direction, RepDirection::UpThenDown);
    }

    #[test]
    fn test_resolve_with_overrides_catalog_floor() {
        let catalog = catalog();
        let strict = MatchThresholds {
            primary: 99.0,
            ..Default::default()
        };

        let resolved = catalog.resolve_with("Barrbell Squat", &strict).unwrap();
        assert!(resolved.is_fallback());
        assert_eq!(
            catalog.resolve_with("back squat", &strict).unwrap().source,
            MatchSource::Exact
        );
        assert!(!catalog.resolve("Barrbell Squat").unwrap().is_fallback());
    }

    #[test]
    fn test_resolve_never_fails_on_names() {
        let catalog = catalog();
        for name in ["", "???", "x", "A very long name for an exercise nobody has heard of"] {
            let resolved = catalog.resolve(name).unwrap();
            assert!(!resolved.rules.angle_rules.is_empty());
        }
    }

    #[test]
    fn test_introspection() {
        let catalog = catalog();
        let stats = catalog.statistics();
        assert_eq!(stats.total_exercises, catalog.len());
        assert_eq!(stats.by_category.values().sum::<usize>(), catalog.len());
        assert_eq!(
            stats.total_angle_rules,
            catalog.exercises().map(|e| e.angle_rules.len()).sum::<usize>()
        );

        let groups = catalog.by_category();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), catalog.categories());
        assert!(catalog
            .exercises_in(ExerciseCategory::Squat)
            .iter()
            .all(|e| e.category == ExerciseCategory::Squat));

        let deadlifts = catalog.search("deadlift");
        assert!(deadlifts.iter().any(|e| e.id == "romanian_deadlift"));
        assert!(catalog.search("").is_empty());
    }

    #[test]
    fn test_loader_is_idempotent() {
        let loader = CatalogLoader::new(RuleSource::Bundled);
        assert!(!loader.is_loaded());
        let first = loader.load().unwrap();
        let second = loader.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(loader.is_loaded());
    }

    #[test]
    fn test_loader_failures() {
        let missing = CatalogLoader::new(RuleSource::File(PathBuf::from("/nonexistent/rules.json")));
        assert!(matches!(missing.load(), Err(Error::DataFormat(_))));
        assert!(!missing.is_loaded());

        let malformed = CatalogLoader::new(RuleSource::Json("[1, 2".to_string()));
        assert!(matches!(malformed.load(), Err(Error::DataFormat(_))));
    }

    #[test]
    fn test_independent_catalogs() {
        let custom = r#"{
            "exercises": [{
                "id": "box_jump", "name": "Box Jump", "category": "other", "type": "other",
                "angleRules": [{ "joints": ["hip", "knee", "ankle"], "minDegrees": 60,
                                 "maxDegrees": 180, "violationType": "knee_cave" }],
                "repDetection": { "keyJoint": "hip", "threshold": 0.2,
                                  "direction": "upThenDown", "holdTimeMs": 50 }
            }]
        }"#;
        let a = RuleCatalog::from_json(custom).unwrap();
        let b = catalog();
        assert!(a.find_exercise_by_name("Box Jump").is_some());
        assert!(b.find_exercise_by_name("Box Jump").is_none());
        assert!(a.find_exercise_by_name("Barbell Squat").is_none());
    }
}
