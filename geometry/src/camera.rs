use crate::ray::{Ray, RAY_EPS};
use math::hcm::{point3, vec3, Frame, Point3, Vec2, Vec3};

/// Diagram camera. `lens`, `film` and `center` are in abstract page units; `scale` converts
/// abstract units to world units (abstract per world). The frame looks from `from` toward
/// `to` with +Y up, viewing along its -z axis.
///
/// Image coordinates `uv` run over [0, 1]^2 with (0, 0) at the top-left pixel corner.
#[derive(Debug, Clone)]
pub struct Camera {
    pub orthographic: bool,
    pub frame: Frame,
    pub center: Vec2,
    pub lens: f32,
    pub film: Vec2,
    pub scale: f32,
}

impl Camera {
    /// `film` is the horizontal film width in abstract units; the vertical extent is
    /// derived from the page aspect ratio so that the film always covers the page.
    pub fn new(
        orthographic: bool, from: Point3, to: Point3, center: Vec2, lens: f32, film: f32,
        page_aspect: f32, scale: f32,
    ) -> Self {
        let film = if page_aspect >= 1.0 {
            Vec2::new(film, film / page_aspect)
        } else {
            Vec2::new(film * page_aspect, film)
        };
        Camera {
            orthographic,
            frame: Frame::look_at(from, to),
            center,
            lens,
            film,
            scale,
        }
    }

    pub fn position(&self) -> Point3 {
        self.frame.o
    }

    /// Unit vector from the camera toward the scene.
    pub fn forward(&self) -> Vec3 {
        -self.frame.z
    }

    /// Distance from the camera to the image plane, in world units.
    pub fn plane_distance(&self) -> f32 {
        self.lens / self.scale
    }

    /// Signed camera-space depth; negative in front of the camera.
    pub fn camera_z(&self, p: Point3) -> f32 {
        self.frame.untransform_point(p).z
    }

    /// Depth clamped to just in front of the camera so that points behind it still project
    /// to finite screen positions.
    pub fn clamped_z(&self, p: Point3) -> f32 {
        self.camera_z(p).min(-RAY_EPS)
    }

    pub fn generate_ray(&self, uv: Vec2) -> Ray {
        let x_f = (uv.x - 0.5) * self.film.x - self.center.x;
        let y_f = (0.5 - uv.y) * self.film.y - self.center.y;
        if self.orthographic {
            let o_local = point3(x_f / self.scale, y_f / self.scale, 0.0);
            Ray::new(self.frame.point(o_local), self.frame.vector(vec3(0.0, 0.0, -1.0)))
        } else {
            let d_local = vec3(x_f, y_f, -self.lens).hat();
            Ray::new(self.frame.o, self.frame.vector(d_local))
        }
    }

    /// Projects a world point to image `uv`. Points behind a perspective camera are clamped
    /// to just in front.
    pub fn project(&self, p: Point3) -> Vec2 {
        let p_cam = self.frame.untransform_point(p);
        let (x_f, y_f) = if self.orthographic {
            (p_cam.x * self.scale, p_cam.y * self.scale)
        } else {
            let inv_depth = self.lens / -p_cam.z.min(-RAY_EPS);
            (p_cam.x * inv_depth, p_cam.y * inv_depth)
        };
        Vec2::new(
            (x_f + self.center.x) / self.film.x + 0.5,
            0.5 - (y_f + self.center.y) / self.film.y,
        )
    }

    /// Inverse of `project` at a known camera-space depth `z` (negative in front). The
    /// input is raw film coordinates (abstract units, centered, y up).
    pub fn unproject(&self, film_xy: Vec2, z: f32) -> Point3 {
        let p_cam = if self.orthographic {
            point3(film_xy.x / self.scale, film_xy.y / self.scale, z)
        } else {
            let depth_scale = -z / self.lens;
            point3(film_xy.x * depth_scale, film_xy.y * depth_scale, z)
        };
        self.frame.point(p_cam)
    }

    /// Raw film coordinates of a world point (abstract units, centered, y up); the
    /// counterpart of `unproject`.
    pub fn film_coords(&self, p: Point3) -> Vec2 {
        let p_cam = self.frame.untransform_point(p);
        if self.orthographic {
            Vec2::new(p_cam.x * self.scale, p_cam.y * self.scale)
        } else {
            let inv_depth = self.lens / -p_cam.z.min(-RAY_EPS);
            Vec2::new(p_cam.x * inv_depth, p_cam.y * inv_depth)
        }
    }

    /// How many image pixels one world unit covers at the depth of `p`, for an image
    /// `width_px` pixels wide. Constant for orthographic cameras.
    pub fn pixels_per_world(&self, p: Point3, width_px: f32) -> f32 {
        if self.orthographic {
            width_px * self.scale / self.film.x
        } else {
            width_px * self.lens / (self.film.x * -self.clamped_z(p))
        }
    }

    /// World-space half-thickness for a stroke of `thickness` pixels at `p`: the
    /// screen-space thickness is preserved under perspective.
    pub fn stroke_radius(&self, thickness: f32, p: Point3, width_px: f32) -> f32 {
        0.5 * thickness / self.pixels_per_world(p, width_px)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use math::hcm::vec2;

    fn cameras() -> Vec<Camera> {
        vec![
            Camera::new(
                true,
                point3(0.0, 0.0, 1.0),
                Point3::ORIGIN,
                Vec2::ZERO,
                0.05,
                0.036,
                1.0,
                0.018,
            ),
            Camera::new(
                false,
                point3(1.0, 2.0, 4.0),
                point3(0.0, 0.5, 0.0),
                vec2(0.002, -0.001),
                0.05,
                0.036,
                1.5,
                0.018,
            ),
        ]
    }

    #[test]
    fn project_ray_roundtrip() {
        for camera in cameras() {
            for &(u, v) in [(0.5f32, 0.5f32), (0.1, 0.8), (0.9, 0.25)].iter() {
                let uv = vec2(u, v);
                let ray = camera.generate_ray(uv);
                let p = ray.position_at(3.0);
                let uv2 = camera.project(p);
                assert!(
                    (uv2 - uv).length() < 1e-4,
                    "uv {:?} reprojects to {:?} (ortho = {})",
                    uv,
                    uv2,
                    camera.orthographic
                );
            }
        }
    }

    #[test]
    fn unproject_roundtrip() {
        for camera in cameras() {
            let p = point3(0.3, -0.2, 0.1);
            let z = camera.camera_z(p);
            let q = camera.unproject(camera.film_coords(p), z);
            assert!(p.squared_distance_to(q) < 1e-6, "{} vs {}", p, q);
        }
    }

    #[test]
    fn ortho_stroke_radius_constant() {
        let camera = &cameras()[0];
        let r_near = camera.stroke_radius(3.0, point3(0.0, 0.0, 0.5), 256.0);
        let r_far = camera.stroke_radius(3.0, point3(0.0, 0.0, -40.0), 256.0);
        assert!((r_near - r_far).abs() < 1e-9);
        // r = thickness * film.x / (2 * scale * width)
        let expected = 3.0 * 0.036 / (2.0 * 0.018 * 256.0);
        assert!((r_near - expected).abs() < 1e-7);
    }

    #[test]
    fn perspective_radius_grows_with_depth() {
        let camera = &cameras()[1];
        let near = camera.frame.point(point3(0.0, 0.0, -1.0));
        let far = camera.frame.point(point3(0.0, 0.0, -5.0));
        let r_near = camera.stroke_radius(3.0, near, 256.0);
        let r_far = camera.stroke_radius(3.0, far, 256.0);
        assert!((r_far / r_near - 5.0).abs() < 1e-4);
    }
}
