//! Procedural primitives for the marker scene: a lat/lon sphere for trail
//! points and a unit cube stretched into the axis gizmos. Geometry lives in
//! local space scaled to a unit-ish extent so instances carry the full
//! model transform.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

const SPHERE_STACKS: u32 = 12;
const SPHERE_SECTORS: u32 = 18;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

pub struct MeshPrimitive {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MeshInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view_projection: [[f32; 4]; 4],
}

pub fn sphere_instance(position: [f32; 3], radius: f32, color: [f32; 3]) -> MeshInstance {
    let transform = Mat4::from_scale_rotation_translation(
        Vec3::splat(radius * 2.0),
        glam::Quat::IDENTITY,
        Vec3::from(position),
    );
    MeshInstance {
        model: to_matrix_columns(transform),
        color: [color[0], color[1], color[2], 1.0],
    }
}

/// Axis gizmo: a cube stretched along one axis, anchored at the origin.
pub fn axis_instance(axis: Vec3, length: f32, thickness: f32, color: [f32; 3]) -> MeshInstance {
    let scale = Vec3::splat(thickness) + axis.abs() * (length - thickness);
    let translation = axis * (length / 2.0);
    let transform = Mat4::from_translation(translation) * Mat4::from_scale(scale);
    MeshInstance {
        model: to_matrix_columns(transform),
        color: [color[0], color[1], color[2], 1.0],
    }
}

pub fn view_projection_uniform(matrix: Mat4) -> SceneUniforms {
    SceneUniforms {
        view_projection: to_matrix_columns(matrix),
    }
}

fn to_matrix_columns(matrix: Mat4) -> [[f32; 4]; 4] {
    let data = matrix.to_cols_array();
    [
        [data[0], data[1], data[2], data[3]],
        [data[4], data[5], data[6], data[7]],
        [data[8], data[9], data[10], data[11]],
        [data[12], data[13], data[14], data[15]],
    ]
}

pub fn build_sphere() -> MeshPrimitive {
    let stacks = SPHERE_STACKS;
    let sectors = SPHERE_SECTORS;
    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    let mut indices = Vec::with_capacity((stacks * sectors * 6) as usize);

    for stack in 0..=stacks {
        let polar = PI * stack as f32 / stacks as f32;
        let (sin_polar, cos_polar) = polar.sin_cos();
        for sector in 0..=sectors {
            let azimuth = 2.0 * PI * sector as f32 / sectors as f32;
            // Unit normal doubles as the position on the half-unit shell.
            let normal = Vec3::new(
                sin_polar * azimuth.cos(),
                cos_polar,
                sin_polar * azimuth.sin(),
            );
            vertices.push(MeshVertex {
                position: (normal * 0.5).into(),
                normal: normal.into(),
            });
        }
    }

    let ring = sectors + 1;
    for stack in 0..stacks {
        for sector in 0..sectors {
            let upper = stack * ring + sector;
            let lower = upper + ring;
            for index in [upper, upper + 1, lower, upper + 1, lower + 1, lower] {
                indices.push(index as u16);
            }
        }
    }

    MeshPrimitive { vertices, indices }
}

pub fn build_cube() -> MeshPrimitive {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for axis in 0..3usize {
        let u_axis = (axis + 1) % 3;
        let v_axis = (axis + 2) % 3;
        for sign in [1.0f32, -1.0] {
            let mut normal = [0.0f32; 3];
            normal[axis] = sign;

            let base = vertices.len() as u16;
            for (du, dv) in [(-0.5f32, -0.5f32), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                let mut position = [0.0f32; 3];
                position[axis] = 0.5 * sign;
                // Mirroring the quad on negative faces keeps the winding
                // outward-facing.
                position[u_axis] = du * sign;
                position[v_axis] = dv;
                vertices.push(MeshVertex { position, normal });
            }
            for index in [base, base + 1, base + 2, base, base + 2, base + 3] {
                indices.push(index);
            }
        }
    }

    MeshPrimitive { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_indices_stay_in_range() {
        let sphere = build_sphere();
        let vertex_count = sphere.vertices.len() as u16;
        assert!(sphere.indices.iter().all(|&index| index < vertex_count));
        assert_eq!(sphere.indices.len() % 3, 0);
    }

    #[test]
    fn sphere_vertices_sit_on_the_half_unit_shell() {
        let sphere = build_sphere();
        for vertex in &sphere.vertices {
            let length = Vec3::from(vertex.position).length();
            assert!((length - 0.5).abs() < 1e-4, "vertex off shell: {length}");
        }
    }

    #[test]
    fn cube_has_one_quad_per_face() {
        let cube = build_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
    }

    #[test]
    fn cube_triangles_wind_outward() {
        let cube = build_cube();
        for triangle in cube.indices.chunks(3) {
            let a = Vec3::from(cube.vertices[triangle[0] as usize].position);
            let b = Vec3::from(cube.vertices[triangle[1] as usize].position);
            let c = Vec3::from(cube.vertices[triangle[2] as usize].position);
            let face_normal = (b - a).cross(c - a);
            let vertex_normal = Vec3::from(cube.vertices[triangle[0] as usize].normal);
            assert!(
                face_normal.dot(vertex_normal) > 0.0,
                "inward-facing triangle {triangle:?}"
            );
        }
    }

    #[test]
    fn sphere_triangles_wind_outward() {
        let sphere = build_sphere();
        for triangle in sphere.indices.chunks(3) {
            let a = Vec3::from(sphere.vertices[triangle[0] as usize].position);
            let b = Vec3::from(sphere.vertices[triangle[1] as usize].position);
            let c = Vec3::from(sphere.vertices[triangle[2] as usize].position);
            let face_normal = (b - a).cross(c - a);
            // Pole triangles collapse to zero area; skip them.
            if face_normal.length() < 1e-6 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(
                face_normal.dot(centroid) > 0.0,
                "inward-facing triangle {triangle:?}"
            );
        }
    }

    #[test]
    fn sphere_instance_scales_by_diameter() {
        let instance = sphere_instance([1.0, 2.0, 3.0], 0.25, [1.0, 0.0, 0.0]);
        // Local geometry spans 0.5, so the model scale is twice the radius.
        assert!((instance.model[0][0] - 0.5).abs() < 1e-6);
        assert_eq!(instance.model[3][0], 1.0);
        assert_eq!(instance.model[3][1], 2.0);
        assert_eq!(instance.model[3][2], 3.0);
    }

    #[test]
    fn axis_instance_stretches_along_its_axis_only() {
        let instance = axis_instance(Vec3::X, 0.8, 0.01, [1.0, 0.0, 0.0]);
        assert!((instance.model[0][0] - 0.8).abs() < 1e-6);
        assert!((instance.model[1][1] - 0.01).abs() < 1e-6);
        assert!((instance.model[2][2] - 0.01).abs() < 1e-6);
        assert!((instance.model[3][0] - 0.4).abs() < 1e-6);
    }
}
