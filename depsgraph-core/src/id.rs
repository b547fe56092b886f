//! Data-blocks
//!
//! The graph wraps externally owned data-blocks ("IDs") for dependency
//! tracking. It never looks inside their content; it only needs to know
//! which kind of data-block it is looking at, whether animation data on it
//! asks for a recompute, and how to make a private copy for evaluation.
//!
//! Data-blocks are shared with the outside world through [`IdRef`], a
//! reference-counted handle. The graph holds a clone of the handle for the
//! original and, with copy-on-write enabled, owns a second handle pointing at
//! its own copy.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Shared handle to a data-block.
pub type IdRef = Arc<RwLock<Id>>;

/// The concrete kind of a data-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Object,
    Mesh,
    Curve,
    Lattice,
    Armature,
    Camera,
    Lamp,
    Material,
    World,
    Texture,
    Image,
    Scene,
    Action,
    ParticleSettings,
    NodeTree,
}

impl IdType {
    pub const ALL: [IdType; 15] = [
        IdType::Object,
        IdType::Mesh,
        IdType::Curve,
        IdType::Lattice,
        IdType::Armature,
        IdType::Camera,
        IdType::Lamp,
        IdType::Material,
        IdType::World,
        IdType::Texture,
        IdType::Image,
        IdType::Scene,
        IdType::Action,
        IdType::ParticleSettings,
        IdType::NodeTree,
    ];

    /// Two-letter code data-block names are prefixed with.
    pub fn code(&self) -> &'static str {
        match self {
            IdType::Object => "OB",
            IdType::Mesh => "ME",
            IdType::Curve => "CU",
            IdType::Lattice => "LT",
            IdType::Armature => "AR",
            IdType::Camera => "CA",
            IdType::Lamp => "LA",
            IdType::Material => "MA",
            IdType::World => "WO",
            IdType::Texture => "TE",
            IdType::Image => "IM",
            IdType::Scene => "SC",
            IdType::Action => "AC",
            IdType::ParticleSettings => "PA",
            IdType::NodeTree => "NT",
        }
    }
}

/// Accepts either the type name (`"Material"`, any case) or its two-letter
/// code (`"MA"`).
impl FromStr for IdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdType::ALL
            .iter()
            .copied()
            .find(|ty| ty.code() == s || format!("{ty:?}").eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown data-block type \"{s}\""))
    }
}

/// Recalculation flags carried by animation data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimRecalc(u8);

impl AnimRecalc {
    pub const NONE: Self = Self(0);
    /// Drivers need to be re-evaluated.
    pub const DRIVERS: Self = Self(1 << 0);
    /// The animation itself needs to be re-evaluated.
    pub const ANIM: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for AnimRecalc {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AnimRecalc {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Animation data attached to a data-block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimData {
    /// Name of the assigned action, if any.
    pub action: Option<String>,
    /// Pending recalculation.
    pub recalc: AnimRecalc,
}

/// An externally owned data-block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Id {
    id_type: IdType,
    name: String,
    anim_data: Option<AnimData>,
    /// Content of the data-block. Opaque to the graph.
    #[serde(default)]
    payload: serde_json::Value,
    /// Set on private evaluation copies.
    #[serde(skip)]
    eval_copy: bool,
}

impl Id {
    /// Create a data-block of the given kind with empty content.
    pub fn new(id_type: IdType, name: impl Into<String>) -> Self {
        Self {
            id_type,
            name: name.into(),
            anim_data: None,
            payload: serde_json::Value::Null,
            eval_copy: false,
        }
    }

    /// Attach content to the data-block.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach animation data to the data-block.
    pub fn with_anim_data(mut self, anim_data: AnimData) -> Self {
        self.anim_data = Some(anim_data);
        self
    }

    /// Wrap the data-block into a shared handle.
    pub fn into_ref(self) -> IdRef {
        Arc::new(RwLock::new(self))
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name including the two-letter kind prefix, e.g. `MECube`.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.id_type.code(), self.name)
    }

    pub fn anim_data(&self) -> Option<&AnimData> {
        self.anim_data.as_ref()
    }

    pub fn anim_data_mut(&mut self) -> Option<&mut AnimData> {
        self.anim_data.as_mut()
    }

    pub fn set_anim_data(&mut self, anim_data: Option<AnimData>) {
        self.anim_data = anim_data;
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut serde_json::Value {
        &mut self.payload
    }

    /// Whether this is a private evaluation copy made by the graph.
    pub fn is_eval_copy(&self) -> bool {
        self.eval_copy
    }

    /// Whether animation data on this data-block asks for an animation
    /// recompute. Data-blocks without animation data never do.
    pub fn has_pending_animation_recalc(&self) -> bool {
        self.anim_data
            .as_ref()
            .is_some_and(|adt| adt.recalc.contains(AnimRecalc::ANIM))
    }

    /// Make a copy of this data-block for evaluation.
    ///
    /// The copy is of the same kind and starts out with the same content;
    /// after that the two are independent.
    pub fn copy_for_eval(&self) -> Self {
        Self {
            eval_copy: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Identity of a data-block handle, stable for as long as the handle lives.
pub(crate) fn id_address(id: &IdRef) -> usize {
    Arc::as_ptr(id) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_name_has_kind_prefix() {
        let id = Id::new(IdType::Mesh, "Cube");
        assert_eq!(id.full_name(), "MECube");
        assert_eq!(id.to_string(), "MECube");
    }

    #[test]
    fn id_type_parses_names_and_codes() {
        assert_eq!("material".parse::<IdType>(), Ok(IdType::Material));
        assert_eq!("WO".parse::<IdType>(), Ok(IdType::World));
        assert!("Speaker".parse::<IdType>().is_err());
    }

    #[test]
    fn animation_recalc_predicate() {
        let bare = Id::new(IdType::Object, "Empty");
        assert!(!bare.has_pending_animation_recalc());

        let drivers_only = Id::new(IdType::Object, "Rig").with_anim_data(AnimData {
            action: None,
            recalc: AnimRecalc::DRIVERS,
        });
        assert!(!drivers_only.has_pending_animation_recalc());

        let animated = Id::new(IdType::Object, "Ball").with_anim_data(AnimData {
            action: Some("Bounce".into()),
            recalc: AnimRecalc::DRIVERS | AnimRecalc::ANIM,
        });
        assert!(animated.has_pending_animation_recalc());
    }

    #[test]
    fn recalc_flags() {
        let mut recalc = AnimRecalc::NONE;
        assert!(recalc.is_empty());

        recalc |= AnimRecalc::ANIM;
        assert!(recalc.contains(AnimRecalc::ANIM));
        assert!(!recalc.contains(AnimRecalc::DRIVERS));

        recalc.remove(AnimRecalc::ANIM);
        assert!(recalc.is_empty());
    }

    #[test]
    fn eval_copy_is_independent() {
        let orig = Id::new(IdType::Material, "Steel").with_payload(json!({ "roughness": 0.2 }));
        let mut copy = orig.copy_for_eval();

        assert!(copy.is_eval_copy());
        assert!(!orig.is_eval_copy());
        assert_eq!(copy.payload(), orig.payload());

        copy.payload_mut()["roughness"] = json!(0.9);
        assert_eq!(orig.payload()["roughness"], json!(0.2));
    }

    #[test]
    fn handles_have_distinct_addresses() {
        let a = Id::new(IdType::Mesh, "A").into_ref();
        let b = Id::new(IdType::Mesh, "A").into_ref();
        assert_ne!(id_address(&a), id_address(&b));
        assert_eq!(id_address(&a), id_address(&Arc::clone(&a)));
    }
}
