// Meshes, textures and programs the shooter draws with.

use glam::Vec3;

use crate::engine::mesh::{self, MeshBuffer};
use crate::engine::renderer::{PROGRAM_EMISSIVE, PROGRAM_LIT, Renderer, TextureImage};
use crate::engine::{MeshId, ProgramId, TextureId};

/// Render resource ids the behaviors spawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameAssets {
    pub aircraft: MeshId,
    pub shot: MeshId,
    pub toroid: MeshId,
    pub blast: MeshId,
    pub player_texture: TextureId,
    pub toroid_texture: TextureId,
    pub glow_texture: TextureId,
    pub white_texture: TextureId,
    pub lit: ProgramId,
    pub emissive: ProgramId,
}

/// Mesh ids from `build_meshes`.
#[derive(Debug, Clone, Copy)]
pub struct MeshSet {
    pub aircraft: MeshId,
    pub shot: MeshId,
    pub toroid: MeshId,
    pub blast: MeshId,
}

/// Build every game mesh into one buffer. Sizes match the collision boxes.
pub fn build_meshes() -> (MeshBuffer, MeshSet) {
    let mut buffer = MeshBuffer::new();
    let set = MeshSet {
        aircraft: buffer.add("Aircraft", &mesh::triangulate_flat(&mesh::fighter())),
        shot: buffer.add("NormalShot", &mesh::triangulate_flat(&mesh::cuboid(Vec3::new(0.08, 0.08, 0.8)))),
        toroid: buffer.add("Toroid", &mesh::triangulate_smooth(&mesh::torus(0.7, 0.3, 24, 12))),
        blast: buffer.add("Blast", &mesh::triangulate_smooth(&mesh::sphere(1.0, 8, 12))),
    };
    (buffer, set)
}

/// The procedural texture images, by name.
pub fn texture_images() -> [(&'static str, TextureImage); 4] {
    [
        ("Player", TextureImage::checker(64, 8, [150, 160, 175, 255], [70, 90, 140, 255])),
        ("Toroid", TextureImage::stripes(64, 4, [235, 120, 40, 255], [90, 20, 20, 255])),
        ("Glow", TextureImage::radial_glow(64)),
        ("White", TextureImage::solid([255; 4])),
    ]
}

impl GameAssets {
    /// Upload the textures and collect every id the game needs.
    pub fn load(renderer: &mut Renderer, meshes: MeshSet) -> Self {
        let [player, toroid, glow, white] =
            texture_images().map(|(name, image)| renderer.add_texture(name, &image));
        Self {
            aircraft: meshes.aircraft,
            shot: meshes.shot,
            toroid: meshes.toroid,
            blast: meshes.blast,
            player_texture: player,
            toroid_texture: toroid,
            glow_texture: glow,
            white_texture: white,
            lit: PROGRAM_LIT,
            emissive: PROGRAM_EMISSIVE,
        }
    }
}
