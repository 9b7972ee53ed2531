use glam::{Mat4, Vec3};

/// A perspective camera.
///
/// `zoom` narrows the field of view the way a physical zoom would:
/// `tan(effective_fov / 2) = tan(fov / 2) / zoom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians, before zoom.
    pub fov: f32,
    pub zoom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 75f32.to_radians(),
            zoom: 1.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.forward = (target - self.position).normalize_or(Vec3::NEG_Z);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom.max(f32::EPSILON);
        self
    }

    /// Field of view after applying zoom.
    pub fn effective_fov(&self) -> f32 {
        2.0 * ((self.fov * 0.5).tan() / self.zoom).atan()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.effective_fov(), aspect, self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_narrows_fov() {
        let camera = Camera::new().with_fov(75.0).with_zoom(1.5);
        let expected = 2.0 * ((37.5f32).to_radians().tan() / 1.5).atan();
        assert!((camera.effective_fov() - expected).abs() < 1e-6);
        assert!(camera.effective_fov() < camera.fov);
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let camera = Camera::new().at(Vec3::new(1.5, 0.0, 4.0)).looking_at(Vec3::ZERO);
        let clip = camera.view_projection(16.0 / 9.0) * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
