// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash rules and the type-combination filter.
//!
//! Rules arrive as camelCase JSON:
//!
//! ```json
//! {
//!   "epsilon": 1e-5,
//!   "typesToIgnore": [{ "type": "IfcBeam", "combinedWith": ["IfcColumn"] }],
//!   "onlyCheckWithOwnType": ["IfcZone"],
//!   "computeVolumes": true
//! }
//! ```
//!
//! Every object gets a type key, either its type name or the value of a
//! configured property. Keys are interned into [`TypeId`]s once per run so
//! that pair lookups during traversal never allocate.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::GeometryObject;

pub const DEFAULT_EPSILON: f64 = 1e-5;

/// Meshes above this many triangles skip the boolean volume computation.
pub const DEFAULT_VOLUME_TRIANGLE_THRESHOLD: usize = 5000;

/// Partner that matches every type in a combination.
pub const ANY_TYPE: &str = "*";

const DEFAULT_OWN_TYPE_ONLY: [&str; 2] = ["Space", "Site"];

const DEFAULT_IGNORED: [(&str, &str); 9] = [
    ("Wall", "OpeningElement"),
    ("WallStandardCase", "OpeningElement"),
    ("Slab", "OpeningElement"),
    ("Wall", "Window"),
    ("WallStandardCase", "Window"),
    ("Wall", "Door"),
    ("WallStandardCase", "Door"),
    ("OpeningElement", "Window"),
    ("OpeningElement", "Door"),
];

/// Configuration of one clash run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ClashDetectorRules {
    pub name: Option<String>,
    pub id: Option<String>,
    /// Plane and interval tolerance of the triangle test, in metres.
    pub epsilon: f64,
    pub skip_default_rules: bool,
    pub only_check_with_own_type: Vec<String>,
    pub types_to_ignore: Vec<TypeCombinations>,
    /// When non-empty, only these combinations are compared.
    pub types_to_check: Vec<TypeCombinations>,
    pub compute_volumes: bool,
    pub min_clash_volume: f64,
    pub min_clash_horizontal: f64,
    pub min_clash_vertical: f64,
    pub volume_triangle_threshold: usize,
    pub property: Option<String>,
    pub property_set: Option<String>,
}

impl Default for ClashDetectorRules {
    fn default() -> Self {
        Self {
            name: None,
            id: None,
            epsilon: DEFAULT_EPSILON,
            skip_default_rules: false,
            only_check_with_own_type: Vec::new(),
            types_to_ignore: Vec::new(),
            types_to_check: Vec::new(),
            compute_volumes: false,
            min_clash_volume: 0.0,
            min_clash_horizontal: 0.0,
            min_clash_vertical: 0.0,
            volume_triangle_threshold: DEFAULT_VOLUME_TRIANGLE_THRESHOLD,
            property: None,
            property_set: None,
        }
    }
}

/// A type and the types it is paired with.
///
/// An empty `combinedWith` pairs the type with itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypeCombinations {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub combined_with: Vec<String>,
}

impl TypeCombinations {
    pub fn new(type_name: impl Into<String>, combined_with: &[&str]) -> Self {
        Self {
            type_name: type_name.into(),
            combined_with: combined_with.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn pairs(&self) -> Vec<(&str, &str)> {
        if self.combined_with.is_empty() {
            return vec![(self.type_name.as_str(), self.type_name.as_str())];
        }
        self.combined_with
            .iter()
            .map(|other| (self.type_name.as_str(), other.as_str()))
            .collect()
    }
}

impl ClashDetectorRules {
    /// Parses and validates a rules payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Self = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(Error::InvalidRules(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        for (name, value) in [
            ("minClashVolume", self.min_clash_volume),
            ("minClashHorizontal", self.min_clash_horizontal),
            ("minClashVertical", self.min_clash_vertical),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidRules(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.property.is_some() != self.property_set.is_some() {
            return Err(Error::InvalidRules(
                "property and propertySet must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// True when type keys come from a property instead of the type name.
    #[inline]
    pub fn uses_property(&self) -> bool {
        self.property.is_some() && self.property_set.is_some()
    }

    /// Whether a clash's intersection solid has to be computed.
    #[inline]
    pub fn needs_volume(&self) -> bool {
        self.compute_volumes
            || self.min_clash_volume > 0.0
            || self.min_clash_horizontal > 0.0
            || self.min_clash_vertical > 0.0
    }

    /// Whether a clash of this size is kept.
    #[inline]
    pub fn accepts(&self, volume: f64, width: f64, height: f64) -> bool {
        volume >= self.min_clash_volume
            && width >= self.min_clash_horizontal
            && height >= self.min_clash_vertical
    }
}

/// Interned type key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Wildcard partner, always id 0.
    pub const ANY: TypeId = TypeId(0);
}

#[derive(Debug, Clone)]
enum KeySource {
    TypeName,
    Property { set: String, name: String },
}

/// Decides which object pairs are compared at all.
#[derive(Debug, Clone)]
pub struct TypeFilter {
    source: KeySource,
    ids: FxHashMap<String, TypeId>,
    names: Vec<String>,
    check: FxHashSet<(TypeId, TypeId)>,
    ignore: FxHashSet<(TypeId, TypeId)>,
    own_type_only: FxHashSet<TypeId>,
}

impl TypeFilter {
    pub fn new(rules: &ClashDetectorRules) -> Self {
        let source = match (&rules.property_set, &rules.property) {
            (Some(set), Some(name)) => KeySource::Property {
                set: set.clone(),
                name: name.clone(),
            },
            _ => KeySource::TypeName,
        };

        let mut filter = Self {
            source,
            ids: FxHashMap::default(),
            names: vec![ANY_TYPE.to_string()],
            check: FxHashSet::default(),
            ignore: FxHashSet::default(),
            own_type_only: FxHashSet::default(),
        };
        filter.ids.insert(ANY_TYPE.to_string(), TypeId::ANY);

        if !rules.skip_default_rules {
            for name in DEFAULT_OWN_TYPE_ONLY {
                let id = filter.intern(name);
                filter.own_type_only.insert(id);
            }
            for (a, b) in DEFAULT_IGNORED {
                let pair = filter.pair(a, b);
                filter.ignore.insert(pair);
            }
        }
        for name in &rules.only_check_with_own_type {
            let id = filter.intern(name);
            filter.own_type_only.insert(id);
        }
        for combination in &rules.types_to_ignore {
            for (a, b) in combination.pairs() {
                let pair = filter.pair(a, b);
                filter.ignore.insert(pair);
            }
        }
        for combination in &rules.types_to_check {
            for (a, b) in combination.pairs() {
                let pair = filter.pair(a, b);
                filter.check.insert(pair);
            }
        }

        filter
    }

    /// Interns a key, normalizing type names so `IfcWall` and `Wall` agree.
    pub fn intern(&mut self, key: &str) -> TypeId {
        let key = match self.source {
            KeySource::TypeName => normalize_type_name(key),
            KeySource::Property { .. } => key,
        };
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = TypeId(self.names.len() as u32);
        self.names.push(key.to_string());
        self.ids.insert(key.to_string(), id);
        id
    }

    /// Resolves and interns the comparison key of an object.
    pub fn resolve(&mut self, object: &GeometryObject) -> TypeId {
        let key = match &self.source {
            KeySource::TypeName => object.type_name.clone(),
            KeySource::Property { set, name } => object.property(set, name).unwrap_or("").to_string(),
        };
        self.intern(&key)
    }

    pub fn name(&self, id: TypeId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or(ANY_TYPE)
    }

    /// Whether two objects should be compared.
    pub fn should_check(&self, oid_a: u64, type_a: TypeId, oid_b: u64, type_b: TypeId) -> bool {
        if oid_a == oid_b {
            return false;
        }
        if !self.check.is_empty() && !matches(&self.check, type_a, type_b) {
            return false;
        }
        if type_a != type_b
            && (self.own_type_only.contains(&type_a) || self.own_type_only.contains(&type_b))
        {
            return false;
        }
        !matches(&self.ignore, type_a, type_b)
    }

    fn pair(&mut self, a: &str, b: &str) -> (TypeId, TypeId) {
        let a = self.intern(a);
        let b = self.intern(b);
        canonical(a, b)
    }
}

#[inline]
fn canonical(a: TypeId, b: TypeId) -> (TypeId, TypeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[inline]
fn matches(set: &FxHashSet<(TypeId, TypeId)>, a: TypeId, b: TypeId) -> bool {
    set.contains(&canonical(a, b))
        || set.contains(&(TypeId::ANY, a))
        || set.contains(&(TypeId::ANY, b))
}

/// Drops a leading `Ifc` schema prefix.
pub fn normalize_type_name(name: &str) -> &str {
    match name.strip_prefix("Ifc") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(filter: &mut TypeFilter, a: &str, b: &str) -> bool {
        let ta = filter.intern(a);
        let tb = filter.intern(b);
        filter.should_check(1, ta, 2, tb)
    }

    #[test]
    fn test_default_rules_skip_wall_openings() {
        let mut filter = TypeFilter::new(&ClashDetectorRules::default());
        assert!(!check(&mut filter, "Wall", "IfcOpeningElement"));
        assert!(!check(&mut filter, "IfcOpeningElement", "IfcWallStandardCase"));
        assert!(!check(&mut filter, "IfcDoor", "IfcWall"));
        assert!(check(&mut filter, "Wall", "Slab"));
        assert!(check(&mut filter, "IfcBeam", "IfcColumn"));
    }

    #[test]
    fn test_same_object_is_never_checked() {
        let mut filter = TypeFilter::new(&ClashDetectorRules::default());
        let wall = filter.intern("IfcWall");
        let slab = filter.intern("IfcSlab");
        assert!(!filter.should_check(7, wall, 7, slab));
    }

    #[test]
    fn test_spaces_only_meet_spaces() {
        let mut filter = TypeFilter::new(&ClashDetectorRules::default());
        assert!(!check(&mut filter, "IfcSpace", "IfcWall"));
        assert!(check(&mut filter, "IfcSpace", "IfcSpace"));
        assert!(!check(&mut filter, "IfcSite", "IfcSpace"));
    }

    #[test]
    fn test_skip_default_rules() {
        let rules = ClashDetectorRules {
            skip_default_rules: true,
            ..Default::default()
        };
        let mut filter = TypeFilter::new(&rules);
        assert!(check(&mut filter, "IfcWall", "IfcOpeningElement"));
        assert!(check(&mut filter, "IfcSpace", "IfcWall"));
    }

    #[test]
    fn test_check_list_restricts_and_ignore_wins() {
        let rules = ClashDetectorRules {
            types_to_check: vec![
                TypeCombinations::new("IfcPipeSegment", &["IfcBeam", "IfcWall"]),
                TypeCombinations::new("IfcDuctSegment", &[]),
            ],
            types_to_ignore: vec![TypeCombinations::new("IfcWall", &["IfcPipeSegment"])],
            ..Default::default()
        };
        let mut filter = TypeFilter::new(&rules);
        assert!(check(&mut filter, "IfcBeam", "IfcPipeSegment"));
        assert!(!check(&mut filter, "IfcPipeSegment", "IfcWall"));
        assert!(!check(&mut filter, "IfcBeam", "IfcColumn"));
        assert!(check(&mut filter, "IfcDuctSegment", "IfcDuctSegment"));
        assert!(!check(&mut filter, "IfcDuctSegment", "IfcBeam"));
    }

    #[test]
    fn test_wildcard_partner() {
        let rules = ClashDetectorRules {
            types_to_ignore: vec![TypeCombinations::new("IfcFurnishingElement", &[ANY_TYPE])],
            ..Default::default()
        };
        let mut filter = TypeFilter::new(&rules);
        assert!(!check(&mut filter, "IfcColumn", "IfcFurnishingElement"));
        assert!(check(&mut filter, "IfcColumn", "IfcBeam"));
    }

    #[test]
    fn test_property_keys() {
        let rules = ClashDetectorRules {
            property: Some("Discipline".into()),
            property_set: Some("Pset_Custom".into()),
            only_check_with_own_type: vec!["HVAC".into()],
            ..Default::default()
        };
        let mut filter = TypeFilter::new(&rules);
        let duct = GeometryObject::new(1, "IfcDuctSegment").with_property("Pset_Custom", "Discipline", "HVAC");
        let beam = GeometryObject::new(2, "IfcBeam").with_property("Pset_Custom", "Discipline", "STR");
        let bare = GeometryObject::new(3, "IfcBeam");

        let (a, b, c) = (filter.resolve(&duct), filter.resolve(&beam), filter.resolve(&bare));
        assert_eq!(filter.name(a), "HVAC");
        assert_eq!(filter.name(c), "");
        assert!(!filter.should_check(1, a, 2, b));
        assert!(filter.should_check(2, b, 3, c));
    }

    #[test]
    fn test_rules_json() {
        let rules = ClashDetectorRules::from_json(
            r#"{
                "name": "MEP vs STR",
                "epsilon": 0.0001,
                "skipDefaultRules": true,
                "typesToIgnore": [{ "type": "IfcBeam", "combinedWith": ["IfcColumn"] }],
                "computeVolumes": true,
                "minClashVolume": 0.001,
                "volumeTriangleThreshold": 100
            }"#,
        )
        .unwrap();
        assert_eq!(rules.epsilon, 1e-4);
        assert!(rules.skip_default_rules);
        assert_eq!(rules.types_to_ignore[0].combined_with, vec!["IfcColumn"]);
        assert_eq!(rules.volume_triangle_threshold, 100);
        assert!(rules.needs_volume());
        assert!(!rules.accepts(0.0005, 1.0, 1.0));
        assert!(rules.only_check_with_own_type.is_empty());
    }

    #[test]
    fn test_rules_json_errors() {
        assert!(matches!(
            ClashDetectorRules::from_json("{\"epsilon\": \"tiny\"}"),
            Err(Error::Rules(_))
        ));
        assert!(matches!(
            ClashDetectorRules::from_json("{\"unknownKnob\": 1}"),
            Err(Error::Rules(_))
        ));
        assert!(matches!(
            ClashDetectorRules::from_json("{\"minClashVertical\": -1}"),
            Err(Error::InvalidRules(_))
        ));
        assert!(matches!(
            ClashDetectorRules::from_json("{\"property\": \"Discipline\"}"),
            Err(Error::InvalidRules(_))
        ));
    }

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("IfcWall"), "Wall");
        assert_eq!(normalize_type_name("Wall"), "Wall");
        assert_eq!(normalize_type_name("Ifcfoo"), "Ifcfoo");
        assert_eq!(normalize_type_name("Ifc"), "Ifc");
    }
}
