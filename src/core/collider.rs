use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ensure, PhysicsError, Result},
    utils::{
        allocator::Handle,
        math::{ccw_sweep, circumcenter, normalized_angle},
    },
};

/// Handle of a [`StaticCollider`] inside a [`crate::World`].
pub type ColliderId = Handle<StaticCollider>;

/// Straight segment with a thickness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GroundDef", into = "GroundDef")]
pub struct Ground {
    start: DVec2,
    end: DVec2,
    thickness: f64,
}

#[derive(Serialize, Deserialize)]
struct GroundDef {
    start: DVec2,
    end: DVec2,
    thickness: f64,
}

impl TryFrom<GroundDef> for Ground {
    type Error = PhysicsError;

    fn try_from(def: GroundDef) -> Result<Self> {
        Ground::new(def.start, def.end, def.thickness)
    }
}

impl From<Ground> for GroundDef {
    fn from(ground: Ground) -> Self {
        Self {
            start: ground.start,
            end: ground.end,
            thickness: ground.thickness,
        }
    }
}

impl Ground {
    pub fn new(start: DVec2, end: DVec2, thickness: f64) -> Result<Self> {
        validate_point("start", start)?;
        validate_point("end", end)?;
        ensure("thickness", thickness, |v| v >= 0.0)?;
        if start == end {
            return Err(PhysicsError::DegenerateGeometry("ground segment has zero length"));
        }
        Ok(Self {
            start,
            end,
            thickness,
        })
    }

    pub fn start(&self) -> DVec2 {
        self.start
    }

    pub fn end(&self) -> DVec2 {
        self.end
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Nearest point on the segment; the endpoints are returned exactly when `t` clamps.
    pub fn project(&self, point: DVec2) -> DVec2 {
        let axis = self.end - self.start;
        let t = (point - self.start).dot(axis) / axis.length_squared();
        if t <= 0.0 {
            self.start
        } else if t >= 1.0 {
            self.end
        } else {
            self.start + axis * t
        }
    }
}

/// Circular arc through three points, swept from `start` via `middle` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CurveDef", into = "CurveDef")]
pub struct Curve {
    start: DVec2,
    middle: DVec2,
    end: DVec2,
    thickness: f64,
    center: DVec2,
    radius: f64,
}

#[derive(Serialize, Deserialize)]
struct CurveDef {
    start: DVec2,
    middle: DVec2,
    end: DVec2,
    thickness: f64,
}

impl TryFrom<CurveDef> for Curve {
    type Error = PhysicsError;

    fn try_from(def: CurveDef) -> Result<Self> {
        Curve::new(def.start, def.middle, def.end, def.thickness)
    }
}

impl From<Curve> for CurveDef {
    fn from(curve: Curve) -> Self {
        Self {
            start: curve.start,
            middle: curve.middle,
            end: curve.end,
            thickness: curve.thickness,
        }
    }
}

impl Curve {
    pub fn new(start: DVec2, middle: DVec2, end: DVec2, thickness: f64) -> Result<Self> {
        validate_point("start", start)?;
        validate_point("middle", middle)?;
        validate_point("end", end)?;
        ensure("thickness", thickness, |v| v >= 0.0)?;
        let center = circumcenter(start, middle, end).ok_or(PhysicsError::DegenerateGeometry(
            "curve points are collinear or coincident",
        ))?;

        Ok(Self {
            start,
            middle,
            end,
            thickness,
            center,
            radius: center.distance(start),
        })
    }

    pub fn start(&self) -> DVec2 {
        self.start
    }

    pub fn middle(&self) -> DVec2 {
        self.middle
    }

    pub fn end(&self) -> DVec2 {
        self.end
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn center(&self) -> DVec2 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Radial projection onto the circle, falling back to the nearer endpoint
    /// when the projected point lies outside the arc.
    pub fn project(&self, point: DVec2) -> DVec2 {
        let offset = point - self.center;
        let distance = offset.length();
        if distance == 0.0 {
            return self.start;
        }

        let candidate = self.center + offset * (self.radius / distance);
        if self.contains_angle(normalized_angle(candidate - self.center)) {
            return candidate;
        }

        if point.distance(self.start) < point.distance(self.end) {
            self.start
        } else {
            self.end
        }
    }

    fn contains_angle(&self, angle: f64) -> bool {
        let start = normalized_angle(self.start - self.center);
        let middle = normalized_angle(self.middle - self.center);
        let end = normalized_angle(self.end - self.center);

        let span = ccw_sweep(start, end);
        if ccw_sweep(start, middle) <= span {
            ccw_sweep(start, angle) <= span
        } else {
            ccw_sweep(end, angle) <= ccw_sweep(end, start)
        }
    }

    fn translate(&mut self, offset: DVec2) {
        self.start += offset;
        self.middle += offset;
        self.end += offset;
        self.center += offset;
    }
}

/// Immovable world geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColliderShape {
    Ground(Ground),
    Curve(Curve),
}

impl ColliderShape {
    pub fn project(&self, point: DVec2) -> DVec2 {
        match self {
            Self::Ground(ground) => ground.project(point),
            Self::Curve(curve) => curve.project(point),
        }
    }

    pub fn thickness(&self) -> f64 {
        match self {
            Self::Ground(ground) => ground.thickness,
            Self::Curve(curve) => curve.thickness,
        }
    }

    /// Per-axis size of the shape used by the contact cheap-reject test.
    pub fn extent(&self) -> DVec2 {
        match self {
            Self::Ground(ground) => (ground.end - ground.start).abs(),
            Self::Curve(curve) => DVec2::splat(2.0 * curve.radius),
        }
    }
}

/// A named static collider owned by the world.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCollider {
    pub name: String,
    pub shape: ColliderShape,
}

impl StaticCollider {
    pub fn project(&self, point: DVec2) -> DVec2 {
        self.shape.project(point)
    }

    pub fn thickness(&self) -> f64 {
        self.shape.thickness()
    }

    /// Whether `point` lies within the thickness band plus `tolerance`.
    pub fn is_near(&self, point: DVec2, tolerance: f64) -> bool {
        point.distance(self.project(point)) <= self.thickness() / 2.0 + tolerance
    }

    /// Moves the whole shape; used by editors dragging geometry around.
    pub fn translate(&mut self, offset: DVec2) {
        match &mut self.shape {
            ColliderShape::Ground(ground) => {
                ground.start += offset;
                ground.end += offset;
            }
            ColliderShape::Curve(curve) => curve.translate(offset),
        }
    }
}

/// Serialized form of a collider: an optional name plus its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub shape: ColliderShape,
}

impl ColliderSpec {
    pub fn ground(start: DVec2, end: DVec2, thickness: f64) -> Result<Self> {
        Ok(Self {
            name: None,
            shape: ColliderShape::Ground(Ground::new(start, end, thickness)?),
        })
    }

    pub fn curve(start: DVec2, middle: DVec2, end: DVec2, thickness: f64) -> Result<Self> {
        Ok(Self {
            name: None,
            shape: ColliderShape::Curve(Curve::new(start, middle, end, thickness)?),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn validate_point(field: &'static str, point: DVec2) -> Result<()> {
    ensure(field, point.x, |_| true)?;
    ensure(field, point.y, |_| true)
}
