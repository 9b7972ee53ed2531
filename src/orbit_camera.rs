use glam::Vec3;
use winit::event::MouseButton;

use crate::camera::Camera;
use crate::input::Input;

const ELEVATION_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A damped camera controller that orbits around a target point.
///
/// Dragging and scrolling add angular and zoom velocity; [`update`] spends a
/// fraction of that velocity every frame, so motion eases out after the
/// pointer is released.
///
/// ```ignore
/// let mut orbit = OrbitCamera::from_position(Vec3::new(1.5, 0.0, 4.0), Vec3::ZERO)
///     .fov(75.0)
///     .zoom(1.5);
///
/// // In the frame loop:
/// orbit.handle_input(&input);
/// orbit.update(dt);
/// let camera = orbit.camera();
/// ```
///
/// [`update`]: OrbitCamera::update
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    /// Point the camera orbits around.
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle in radians.
    pub azimuth: f32,
    /// Vertical angle in radians, clamped short of the poles.
    pub elevation: f32,
    /// Vertical field of view in radians, before zoom.
    pub fov: f32,
    pub zoom: f32,
    /// Fraction of the remaining velocity applied per 60 Hz frame, in (0, 1].
    pub damping: f32,
    pub sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    azimuth_velocity: f32,
    elevation_velocity: f32,
    distance_velocity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.3,
            fov: 75f32.to_radians(),
            zoom: 1.0,
            damping: 0.1,
            sensitivity: 0.005,
            zoom_sensitivity: 0.5,
            min_distance: 1.5,
            max_distance: 20.0,
            azimuth_velocity: 0.0,
            elevation_velocity: 0.0,
            distance_velocity: 0.0,
        }
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `position`, looking at `target`.
    pub fn from_position(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let distance = offset.length().max(f32::EPSILON);
        let defaults = Self::default();
        Self {
            target,
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            min_distance: defaults.min_distance.min(distance),
            max_distance: defaults.max_distance.max(distance),
            ..defaults
        }
    }

    pub fn target(mut self, target: impl Into<Vec3>) -> Self {
        self.target = target.into();
        self
    }

    pub fn distance(mut self, distance: f32) -> Self {
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self
    }

    /// Set the field of view in degrees.
    pub fn fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom.max(f32::EPSILON);
        self
    }

    pub fn damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(f32::EPSILON, 1.0);
        self
    }

    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self.distance = self.distance.clamp(min, max);
        self
    }

    /// Turn this frame's drag and wheel motion into velocity.
    pub fn handle_input(&mut self, input: &Input) {
        if input.mouse_down(MouseButton::Left) {
            let delta = input.mouse_delta();
            self.azimuth_velocity -= delta.x * self.sensitivity;
            self.elevation_velocity += delta.y * self.sensitivity;
        }

        let scroll = input.scroll_delta();
        if scroll.y != 0.0 {
            self.distance_velocity -= scroll.y * self.zoom_sensitivity;
        }
    }

    /// Advance the damped motion by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let step = 1.0 - (1.0 - self.damping).powf(dt.max(0.0) * 60.0);

        self.azimuth += self.azimuth_velocity * step;
        self.elevation = (self.elevation + self.elevation_velocity * step)
            .clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        self.distance = (self.distance + self.distance_velocity * step)
            .clamp(self.min_distance, self.max_distance);

        let keep = 1.0 - step;
        self.azimuth_velocity *= keep;
        self.elevation_velocity *= keep;
        self.distance_velocity *= keep;
    }

    /// True while there is visible motion left to spend.
    pub fn is_moving(&self) -> bool {
        const REST: f32 = 1e-5;
        self.azimuth_velocity.abs() > REST
            || self.elevation_velocity.abs() > REST
            || self.distance_velocity.abs() > REST
    }

    pub fn position(&self) -> Vec3 {
        let offset = Vec3::new(
            self.elevation.cos() * self.azimuth.sin(),
            self.elevation.sin(),
            self.elevation.cos() * self.azimuth.cos(),
        );
        self.target + offset * self.distance
    }

    pub fn camera(&self) -> Camera {
        let position = self.position();
        Camera {
            position,
            forward: (self.target - position).normalize_or(Vec3::NEG_Z),
            up: Vec3::Y,
            fov: self.fov,
            zoom: self.zoom,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_position_round_trips() {
        let start = Vec3::new(1.5, 0.0, 4.0);
        let orbit = OrbitCamera::from_position(start, Vec3::ZERO);
        assert!((orbit.position() - start).length() < 1e-5);
        assert!(orbit.camera().forward.dot(-start.normalize()) > 0.9999);
    }

    #[test]
    fn damping_converges_to_the_full_impulse() {
        let mut orbit = OrbitCamera::from_position(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO);
        orbit.azimuth_velocity = 0.5;

        for _ in 0..600 {
            orbit.update(1.0 / 60.0);
        }
        assert!(!orbit.is_moving());
        assert!((orbit.azimuth - 0.5).abs() < 1e-3);
    }

    #[test]
    fn damping_is_frame_rate_independent() {
        let mut fast = OrbitCamera::new();
        let mut slow = OrbitCamera::new();
        fast.azimuth_velocity = 1.0;
        slow.azimuth_velocity = 1.0;

        for _ in 0..120 {
            fast.update(1.0 / 120.0);
        }
        for _ in 0..30 {
            slow.update(1.0 / 30.0);
        }
        assert!((fast.azimuth - slow.azimuth).abs() < 1e-4);
    }

    #[test]
    fn elevation_and_distance_stay_clamped() {
        let mut orbit = OrbitCamera::new();
        orbit.elevation_velocity = 100.0;
        orbit.distance_velocity = 1000.0;
        for _ in 0..100 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.elevation <= ELEVATION_LIMIT);
        assert_eq!(orbit.distance, orbit.max_distance);
    }
}
