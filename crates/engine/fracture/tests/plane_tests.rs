//! Breakable plane tests
//!
//! Covers grid construction preconditions, break streams and fragment
//! synthesis on simple box panes.

use fracture::{
    check_geometry, AssetId, BadGeometry, BreakableMaterial, BreakablePlane, FractureError,
    FlatPieceParams, MeshAsset, PhysGeometry, RenderMesh, Vertex, LOOP_END, MAX_GRID_CELLS,
    PIECE_END, STREAM_END,
};
use glam::{Mat4, Vec2, Vec3};

/// Box pane of `w` x `h` x `t` with front (+Z) and back (-Z) faces
fn pane(w: f32, h: f32, t: f32, two_sided: bool) -> MeshAsset {
    let mut mesh = RenderMesh::new();
    let v = |x: f32, y: f32, z: f32, n: Vec3| {
        Vertex::new(Vec3::new(x, y, z), n, Vec2::new(x / w, y / h))
    };
    let (f, b) = (t * 0.5, -t * 0.5);
    mesh.push_triangle([v(0.0, 0.0, f, Vec3::Z), v(w, 0.0, f, Vec3::Z), v(w, h, f, Vec3::Z)], 0);
    mesh.push_triangle([v(0.0, 0.0, f, Vec3::Z), v(w, h, f, Vec3::Z), v(0.0, h, f, Vec3::Z)], 0);
    if two_sided {
        let n = Vec3::NEG_Z;
        mesh.push_triangle([v(0.0, 0.0, b, n), v(w, h, b, n), v(w, 0.0, b, n)], 0);
        mesh.push_triangle([v(0.0, 0.0, b, n), v(0.0, h, b, n), v(w, h, b, n)], 0);
    }
    MeshAsset::new(AssetId(7), "pane", mesh)
}

/// Closed unit cube
fn cube() -> MeshAsset {
    let mut mesh = RenderMesh::new();
    let corners = |axis: usize, s: f32| {
        let mut quad = [Vec3::ZERO; 4];
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for (i, (a, b)) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].iter().enumerate() {
            quad[i][axis] = s;
            quad[i][u] = *a;
            quad[i][v] = *b;
        }
        quad
    };
    for axis in 0..3 {
        for s in [0.0, 1.0] {
            let q = corners(axis, s).map(|p| Vertex::new(p, Vec3::ZERO, Vec2::ZERO));
            mesh.push_triangle([q[0], q[1], q[2]], 0);
            mesh.push_triangle([q[0], q[2], q[3]], 0);
        }
    }
    MeshAsset::new(AssetId(9), "cube", mesh)
}

fn loops_of(tokens: &[i32]) -> Vec<Vec<i32>> {
    let mut loops = Vec::new();
    let mut current = Vec::new();
    for &t in tokens {
        match t {
            LOOP_END => loops.push(std::mem::take(&mut current)),
            PIECE_END | STREAM_END => {}
            i => current.push(i),
        }
    }
    assert!(current.is_empty(), "trailing indices without LOOP_END");
    loops
}

#[test]
fn test_thin_pane_builds_grid() {
    let mut asset = pane(1.0, 0.8, 0.02, true);
    let material = BreakableMaterial::default();

    let plane = BreakablePlane::set_geometry(&mut asset, &material, false, 1)
        .expect("thin pane should be breakable");

    let cells = plane.grid().cell_count();
    assert!(cells > 0, "grid should not be empty");
    assert!(cells <= MAX_GRID_CELLS, "grid has {} cells", cells);
    assert!(asset.mesh.is_none(), "render mesh should be freed");
    assert!(asset.phys.is_some(), "physical geometry should be cached");
    assert!(!plane.is_one_sided());
}

#[test]
fn test_cube_is_not_planar() {
    let mut asset = cube();
    let result = BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 1);
    assert!(
        matches!(
            result,
            Err(FractureError::BadGeometry(BadGeometry::NotPlanar { .. }))
        ),
        "cube should fail planarity, got {:?}",
        result.map(|_| ())
    );
    assert!(asset.mesh.is_some(), "failed build must not free the mesh");
}

#[test]
fn test_multiple_materials_rejected() {
    let mut asset = pane(1.0, 1.0, 0.02, true);
    if let Some(mesh) = asset.mesh.as_mut() {
        mesh.materials[3] = 2;
    }
    let result = check_geometry(&asset, &BreakableMaterial::default());
    assert_eq!(
        result.err(),
        Some(FractureError::BadGeometry(BadGeometry::MultipleMaterials { count: 2 }))
    );
}

#[test]
fn test_cell_cap_enforced() {
    let asset = pane(10.0, 10.0, 0.05, true);
    let material = BreakableMaterial {
        cell_size: 0.05,
        ..Default::default()
    };
    match check_geometry(&asset, &material) {
        Err(FractureError::BadGeometry(BadGeometry::TooManyCells { cells, cap })) => {
            assert_eq!(cap, MAX_GRID_CELLS);
            assert!(cells > cap);
        }
        other => panic!("expected TooManyCells, got {:?}", other),
    }
}

#[test]
fn test_check_geometry_agrees_with_set_geometry() {
    let material = BreakableMaterial::default();
    for size in [4.0, 4.5, 6.0] {
        let mut asset = pane(size, size, 0.02, true);
        let checked = check_geometry(&asset, &material).is_ok();
        let built = BreakablePlane::set_geometry(&mut asset, &material, true, 11).is_ok();
        assert_eq!(checked, built, "{}m pane: check and build disagree", size);
    }
    let mut big = pane(6.0, 6.0, 0.02, true);
    assert!(BreakablePlane::set_geometry(&mut big, &material, true, 11).is_err());
}

#[test]
fn test_check_geometry_is_pure() {
    let material = BreakableMaterial::default();
    let sample = pane(1.0, 0.5, 0.01, true);
    let first = check_geometry(&sample, &material).is_ok();

    // Break a different asset in between
    let mut other = pane(1.0, 0.5, 0.01, true);
    let plane = BreakablePlane::set_geometry(&mut other, &material, false, 5).unwrap();
    let _ = plane.break_at(Vec3::new(0.5, 0.25, 0.0), 0.2, 1, 0.3);

    let second = check_geometry(&sample, &material).is_ok();
    assert!(first);
    assert_eq!(first, second);
    assert!(sample.mesh.is_some(), "check must not touch the asset");
    assert!(check_geometry(&cube(), &material).is_err());
    assert!(check_geometry(&cube(), &material).is_err());
}

#[test]
fn test_break_stream_loops_have_three_vertices() {
    let material = BreakableMaterial::default();
    let mut asset = pane(1.2, 0.9, 0.02, true);
    let plane = BreakablePlane::set_geometry(&mut asset, &material, false, 11).unwrap();

    let impacts = [
        (Vec3::new(0.6, 0.45, 0.0), 0.2),
        (Vec3::new(0.0, 0.0, 0.0), 0.35),
        (Vec3::new(1.2, 0.3, 0.01), 0.1),
        (Vec3::new(0.6, 0.45, 0.0), 5.0),
    ];
    for (seed, (impact, radius)) in impacts.iter().enumerate() {
        let stream = plane.break_at(*impact, *radius, seed as u64, 0.4);
        let tokens = stream.tokens();
        assert_eq!(tokens.last(), Some(&STREAM_END), "stream must be terminated");
        assert_eq!(tokens.iter().filter(|&&t| t == STREAM_END).count(), 1);
        for l in loops_of(tokens) {
            assert!(l.len() >= 3, "loop {:?} has fewer than 3 vertices", l);
            assert!(l.iter().all(|&i| (i as usize) < plane.grid().points().len()));
        }
        let terminals = stream.cursor().filter(|p| p.terminal).count();
        assert_eq!(terminals, 1, "exactly one terminal piece");
    }
}

#[test]
fn test_break_is_deterministic() {
    let material = BreakableMaterial::default();
    let mut a = pane(1.0, 1.0, 0.02, true);
    let mut b = pane(1.0, 1.0, 0.02, true);
    let pa = BreakablePlane::set_geometry(&mut a, &material, false, 3).unwrap();
    let pb = BreakablePlane::set_geometry(&mut b, &material, false, 3).unwrap();
    let impact = Vec3::new(0.3, 0.7, 0.0);
    assert_eq!(pa.break_at(impact, 0.25, 8, 0.3), pb.break_at(impact, 0.25, 8, 0.3));
}

#[test]
fn test_missed_impact_yields_empty_stream() {
    let mut asset = pane(1.0, 1.0, 0.02, true);
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 3).unwrap();
    let stream = plane.break_at(Vec3::new(10.0, 10.0, 0.0), 0.1, 1, 0.3);
    assert_eq!(stream.tokens(), &[STREAM_END]);
    assert_eq!(stream.piece_count(), 0);
}

#[test]
fn test_pieces_cover_the_pane() {
    let mut asset = pane(1.0, 0.8, 0.02, true);
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 21).unwrap();
    let stream = plane.break_at(Vec3::new(0.5, 0.4, 0.0), 0.25, 4, 0.3);
    let pieces = plane.synthesize(&stream, &Mat4::IDENTITY, &FlatPieceParams::default());

    let area: f32 = pieces.iter().map(|p| p.area).sum();
    assert!((area - 0.8).abs() < 0.8 * 0.01, "pieces cover {} of 0.8", area);
    assert!(pieces.len() >= 2, "impact should split the pane");
    assert!(pieces.last().map(|p| p.terminal).unwrap_or(false));
    for piece in &pieces {
        assert!(!piece.mesh.is_empty());
        assert!(matches!(piece.phys, Some(PhysGeometry::TriMesh { .. })));
        // Piece frames are centred on the piece
        let c = piece.bounds.center();
        assert!(c.length() < 0.6, "piece centre {:?} far from origin", c);
    }
}

#[test]
fn test_static_axis_aligned_pieces_use_voxels() {
    let mut asset = pane(1.0, 1.0, 0.05, true);
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), true, 2).unwrap();
    let stream = plane.break_at(Vec3::new(0.5, 0.5, 0.0), 0.2, 1, 0.3);
    let world = Mat4::from_translation(Vec3::new(4.0, 0.0, -2.0));
    let pieces = plane.synthesize(&stream, &world, &FlatPieceParams::default());
    let voxel_pieces = pieces
        .iter()
        .filter(|p| p.phys.as_ref().map(PhysGeometry::is_voxels).unwrap_or(false))
        .count();
    assert_eq!(voxel_pieces, pieces.len());

    let rotated = Mat4::from_rotation_y(0.4);
    let pieces = plane.synthesize(&stream, &rotated, &FlatPieceParams::default());
    assert!(pieces
        .iter()
        .all(|p| matches!(p.phys, Some(PhysGeometry::TriMesh { .. }))));
}

#[test]
fn test_one_sided_pieces_have_front_only() {
    let mut asset = pane(1.0, 1.0, 0.0, false);
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 2).unwrap();
    assert!(plane.is_one_sided());
    let stream = plane.break_at(Vec3::new(0.5, 0.5, 0.0), 0.3, 1, 0.3);
    let params = FlatPieceParams {
        no_physics: true,
        ..Default::default()
    };
    for piece in plane.synthesize(&stream, &Mat4::IDENTITY, &params) {
        assert!(piece.phys.is_none());
        for v in &piece.mesh.vertices {
            assert!((v.normal - Vec3::Z).length() < 1e-5, "unexpected normal {:?}", v.normal);
        }
    }
}

#[test]
fn test_back_facing_pane_flips_frame() {
    let mut asset = pane(1.0, 1.0, 0.0, false);
    if let Some(mesh) = asset.mesh.as_mut() {
        for tri in mesh.indices.chunks_mut(3) {
            tri.swap(1, 2);
        }
    }
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 2).unwrap();
    assert_eq!(plane.frame().normal(), Vec3::NEG_Z);
}

#[test]
fn test_crumble_effects_follow_outline() {
    let mut asset = pane(1.0, 1.0, 0.02, true);
    let plane =
        BreakablePlane::set_geometry(&mut asset, &BreakableMaterial::default(), false, 2).unwrap();
    let stream = plane.break_at(Vec3::new(0.5, 0.5, 0.0), 0.15, 1, 0.3);
    let params = FlatPieceParams {
        effect: Some("glass_crumble"),
        edge_alpha: 0.5,
        crumble_spacing: 0.05,
        no_physics: false,
    };
    let pieces = plane.synthesize(&stream, &Mat4::IDENTITY, &params);
    let effects: Vec<_> = pieces.iter().flat_map(|p| p.effects.iter()).collect();
    assert!(!effects.is_empty(), "outline edges should crumble");
    for e in effects {
        assert_eq!(e.effect, "glass_crumble");
        assert_eq!(e.alpha, 0.5);
        assert!((e.position.z - 0.01).abs() < 1e-4, "effects sit on the front face");
    }
}
