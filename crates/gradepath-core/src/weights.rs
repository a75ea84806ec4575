//! Weight resolution for module components and activity types.
//!
//! Course-scoped settings replace the global scope wholesale for a
//! dimension; there is no per-key merge. Resolutions are cached per
//! (course, dimension) until explicitly invalidated.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GradeError, GradeResult};
use crate::model::{ActivityCategory, GradeSetting, WeightDimension};

pub const LESSONS_KEY: &str = "lessons";
pub const ACTIVITIES_KEY: &str = "activities";

/// Allowed deviation from 100 when validating a weight set.
const SUM_TOLERANCE: f64 = 0.01;

/// `abs(sum - 100) < 0.01`.
pub fn weights_sum_to_100<I>(weights: I) -> bool
where
    I: IntoIterator<Item = f64>,
{
    let sum: f64 = weights.into_iter().sum();
    (sum - 100.0).abs() < SUM_TOLERANCE
}

/// Lesson vs activity share of a module score, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleComponentWeights {
    pub lessons: f64,
    pub activities: f64,
}

impl Default for ModuleComponentWeights {
    fn default() -> Self {
        Self {
            lessons: 30.0,
            activities: 70.0,
        }
    }
}

/// Per-category weights, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityTypeWeights {
    weights: BTreeMap<ActivityCategory, f64>,
}

impl ActivityTypeWeights {
    pub fn new(weights: BTreeMap<ActivityCategory, f64>) -> Self {
        Self { weights }
    }

    pub fn uniform() -> Self {
        Self::new(ActivityCategory::ALL.into_iter().map(|c| (c, 25.0)).collect())
    }

    /// Weight of `category`; missing categories weigh zero.
    pub fn get(&self, category: ActivityCategory) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActivityCategory, f64)> + '_ {
        self.weights.iter().map(|(c, w)| (*c, *w))
    }
}

impl Default for ActivityTypeWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Built-in weights used when neither the course nor the global scope has rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightDefaults {
    #[serde(default)]
    pub module_components: ModuleComponentWeights,
    #[serde(default)]
    pub activity_types: ActivityTypeWeights,
}

/// Where a weight row applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WeightScope {
    Global,
    Course(String),
}

impl WeightScope {
    fn course_id(&self) -> Option<&str> {
        match self {
            WeightScope::Global => None,
            WeightScope::Course(id) => Some(id.as_str()),
        }
    }
}

type CacheKey = (String, WeightDimension);

/// Resolves weights with course-over-global fallback.
pub struct WeightResolver {
    settings: RwLock<Vec<GradeSetting>>,
    cache: RwLock<HashMap<CacheKey, BTreeMap<String, f64>>>,
    defaults: WeightDefaults,
}

impl WeightResolver {
    pub fn new(settings: Vec<GradeSetting>, defaults: WeightDefaults) -> Self {
        Self {
            settings: RwLock::new(settings),
            cache: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Lesson/activity weights for `course_id`.
    pub fn resolve_module_component_weights(&self, course_id: &str) -> ModuleComponentWeights {
        let raw = self.resolve_raw(course_id, WeightDimension::ModuleComponents);
        if raw.is_empty() {
            tracing::debug!("no module component weights for {course_id}, using defaults");
            return self.defaults.module_components;
        }

        for key in raw.keys() {
            if key != LESSONS_KEY && key != ACTIVITIES_KEY {
                tracing::warn!("ignoring unknown module component weight key '{key}'");
            }
        }

        ModuleComponentWeights {
            lessons: raw.get(LESSONS_KEY).copied().unwrap_or(0.0),
            activities: raw.get(ACTIVITIES_KEY).copied().unwrap_or(0.0),
        }
    }

    /// Quiz/Assignment/Assessment/Exercise weights for `course_id`.
    pub fn resolve_activity_type_weights(&self, course_id: &str) -> ActivityTypeWeights {
        let raw = self.resolve_raw(course_id, WeightDimension::ActivityTypes);
        if raw.is_empty() {
            tracing::debug!("no activity type weights for {course_id}, using defaults");
            return self.defaults.activity_types.clone();
        }

        let mut weights = BTreeMap::new();
        for (key, weight) in raw {
            match ActivityCategory::from_key(&key) {
                Some(category) => {
                    weights.insert(category, weight);
                }
                None => tracing::warn!("ignoring unknown activity type weight key '{key}'"),
            }
        }
        ActivityTypeWeights::new(weights)
    }

    fn resolve_raw(&self, course_id: &str, dimension: WeightDimension) -> BTreeMap<String, f64> {
        let key = (course_id.to_string(), dimension);
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return hit.clone();
        }

        // Hold the settings guard until the insert so a concurrent write
        // cannot invalidate between the read and the cache fill.
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        let collect = |scope: Option<&str>| -> BTreeMap<String, f64> {
            settings
                .iter()
                .filter(|s| s.is_active && s.dimension == dimension)
                .filter(|s| s.course_id.as_deref() == scope)
                .map(|s| (s.key.clone(), s.weight))
                .collect()
        };

        let course = collect(Some(course_id));
        let resolved = if course.is_empty() {
            collect(None)
        } else {
            course
        };

        if !resolved.is_empty() && !weights_sum_to_100(resolved.values().copied()) {
            tracing::warn!(
                "{dimension} weights for {course_id} sum to {:.2}, not 100",
                resolved.values().sum::<f64>()
            );
        }

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, resolved.clone());
        drop(settings);
        resolved
    }

    /// Drop cached resolutions affected by a write to `scope`.
    ///
    /// Every course can fall back to the global scope, so a global
    /// invalidation clears the whole cache.
    pub fn invalidate(&self, scope: &WeightScope) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        match scope {
            WeightScope::Global => cache.clear(),
            WeightScope::Course(id) => cache.retain(|(course, _), _| course != id),
        }
    }

    /// Validate and store a complete weight set for `scope` and `dimension`.
    ///
    /// Replaces any existing rows of that scope and dimension. Returns the
    /// new rows so the caller can persist them.
    pub fn apply_settings(
        &self,
        scope: &WeightScope,
        dimension: WeightDimension,
        weights: &BTreeMap<String, f64>,
    ) -> GradeResult<Vec<GradeSetting>> {
        validate_weights(dimension, weights)?;

        let rows: Vec<GradeSetting> = weights
            .iter()
            .map(|(key, weight)| GradeSetting {
                id: Uuid::new_v4().to_string(),
                course_id: scope.course_id().map(String::from),
                dimension,
                key: key.clone(),
                weight: *weight,
                is_active: true,
            })
            .collect();

        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            settings.retain(|s| {
                !(s.dimension == dimension && s.course_id.as_deref() == scope.course_id())
            });
            settings.extend(rows.iter().cloned());
        }

        self.invalidate(scope);
        Ok(rows)
    }

    /// Remove every row of `scope` and `dimension`; returns how many were removed.
    pub fn remove_settings(&self, scope: &WeightScope, dimension: WeightDimension) -> usize {
        let removed = {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let before = settings.len();
            settings.retain(|s| {
                !(s.dimension == dimension && s.course_id.as_deref() == scope.course_id())
            });
            before - settings.len()
        };
        self.invalidate(scope);
        removed
    }

    /// Swap in a freshly loaded settings table.
    pub fn reload(&self, settings: Vec<GradeSetting>) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        self.invalidate(&WeightScope::Global);
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Whether `key` names a weight of `dimension`.
pub fn is_known_key(dimension: WeightDimension, key: &str) -> bool {
    match dimension {
        WeightDimension::ModuleComponents => key == LESSONS_KEY || key == ACTIVITIES_KEY,
        WeightDimension::ActivityTypes => ActivityCategory::from_key(key).is_some(),
    }
}

/// Write-time validation of a weight set.
pub fn validate_weights(
    dimension: WeightDimension,
    weights: &BTreeMap<String, f64>,
) -> GradeResult<()> {
    if weights.is_empty() {
        return Err(GradeError::Validation(format!(
            "{dimension} weight set is empty"
        )));
    }

    for (key, weight) in weights {
        if !is_known_key(dimension, key) {
            return Err(GradeError::Validation(format!(
                "unknown {dimension} weight key '{key}'"
            )));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(GradeError::Validation(format!(
                "weight for '{key}' must be non-negative, got {weight}"
            )));
        }
    }

    if !weights_sum_to_100(weights.values().copied()) {
        return Err(GradeError::Validation(format!(
            "{dimension} weights must sum to 100, got {:.2}",
            weights.values().sum::<f64>()
        )));
    }

    Ok(())
}
