//! 2D polygon kernel for fracture grids
//!
//! Polygons are counter-clockwise loops, either as point slices or as index
//! loops into a shared point array. Sharing indices between grid cells is
//! what makes merging cells a pure edge-cancellation problem.

use glam::Vec2;
use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;

/// Twice-signed area is positive for counter-clockwise loops
pub fn signed_area(poly: &[Vec2]) -> f32 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

/// Resolve an index loop into points
pub fn loop_points(points: &[Vec2], indices: &[u32]) -> Vec<Vec2> {
    indices.iter().map(|&i| points[i as usize]).collect()
}

/// Area-weighted centroid, falling back to the vertex average for degenerate loops
pub fn centroid(poly: &[Vec2]) -> Vec2 {
    let n = poly.len();
    if n == 0 {
        return Vec2::ZERO;
    }
    let mut area2 = 0.0;
    let mut c = Vec2::ZERO;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let cross = a.perp_dot(b);
        area2 += cross;
        c += (a + b) * cross;
    }
    if area2.abs() < 1e-12 {
        return poly.iter().copied().sum::<Vec2>() / n as f32;
    }
    c / (3.0 * area2)
}

/// Interior angle at every vertex of a counter-clockwise loop, in radians
pub fn interior_angles(poly: &[Vec2]) -> Vec<f32> {
    let n = poly.len();
    (0..n)
        .map(|i| {
            let v = poly[i];
            let to_next = poly[(i + 1) % n] - v;
            let to_prev = poly[(i + n - 1) % n] - v;
            let mut angle = to_next.perp_dot(to_prev).atan2(to_next.dot(to_prev));
            if angle < 0.0 {
                angle += TAU;
            }
            angle
        })
        .collect()
}

/// Smallest interior angle of a counter-clockwise loop
pub fn min_interior_angle(poly: &[Vec2]) -> f32 {
    interior_angles(poly)
        .into_iter()
        .fold(f32::INFINITY, f32::min)
}

/// Crossing-number point-in-polygon test
pub fn point_in_polygon(p: Vec2, poly: &[Vec2]) -> bool {
    let n = poly.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to segment `ab`
pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// True when a disc overlaps the polygon (inside or touching an edge)
pub fn circle_intersects_polygon(center: Vec2, radius: f32, poly: &[Vec2]) -> bool {
    if point_in_polygon(center, poly) {
        return true;
    }
    let n = poly.len();
    (0..n).any(|i| distance_to_segment(center, poly[i], poly[(i + 1) % n]) <= radius)
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    d1 > 0.0 && d2 > 0.0 && d3 > 0.0
}

/// Ear-clipping triangulation of a simple counter-clockwise polygon
///
/// Returns triangles as indices into `poly`. If no ear can be found (self
/// intersecting input) the remaining vertices are clipped in order so the
/// output always covers `poly.len() - 2` triangles.
pub fn triangulate(poly: &[Vec2]) -> Vec<[usize; 3]> {
    let n = poly.len();
    if n < 3 {
        return Vec::new();
    }
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let mut clipped = false;
        for i in 0..m {
            let (ip, ic, inx) = (remaining[(i + m - 1) % m], remaining[i], remaining[(i + 1) % m]);
            let (a, b, c) = (poly[ip], poly[ic], poly[inx]);
            if (b - a).perp_dot(c - b) <= 1e-12 {
                continue;
            }
            let blocked = remaining.iter().any(|&k| {
                k != ip
                    && k != ic
                    && k != inx
                    && poly[k] != a
                    && poly[k] != b
                    && poly[k] != c
                    && point_in_triangle(poly[k], a, b, c)
            });
            if !blocked {
                triangles.push([ip, ic, inx]);
                remaining.remove(i);
                clipped = true;
                break;
            }
        }
        if !clipped {
            let m = remaining.len();
            triangles.push([remaining[m - 1], remaining[0], remaining[1]]);
            remaining.remove(0);
        }
    }
    triangles.push([remaining[0], remaining[1], remaining[2]]);
    triangles
}

/// Directed edges of `loops` that are not cancelled by an opposite edge
///
/// For a set of cells sharing vertex indices these are the outline edges of
/// their union.
pub fn silhouette_edges<'a, I>(loops: I) -> Vec<(u32, u32)>
where
    I: IntoIterator<Item = &'a [u32]>,
{
    let mut edges = Vec::new();
    for l in loops {
        let n = l.len();
        for i in 0..n {
            edges.push((l[i], l[(i + 1) % n]));
        }
    }
    let set: HashSet<(u32, u32)> = edges.iter().copied().collect();
    edges
        .into_iter()
        .filter(|&(a, b)| !set.contains(&(b, a)))
        .collect()
}

/// Outline loops of the union of index loops
///
/// Chains the silhouette edges into closed loops. A simply connected union
/// yields exactly one loop; holes and disjoint parts yield more.
pub fn boundary_loops<'a, I>(loops: I) -> Vec<Vec<u32>>
where
    I: IntoIterator<Item = &'a [u32]>,
{
    let edges = silhouette_edges(loops);
    let mut next: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in &edges {
        next.entry(a).or_default().push(b);
    }

    let mut result = Vec::new();
    for &(start, _) in &edges {
        loop {
            let Some(outgoing) = next.get_mut(&start) else {
                break;
            };
            let Some(first) = outgoing.pop() else {
                break;
            };
            let mut chain = vec![start];
            let mut cur = first;
            while cur != start {
                chain.push(cur);
                match next.get_mut(&cur).and_then(|o| o.pop()) {
                    Some(n) => cur = n,
                    None => break,
                }
            }
            if cur == start && chain.len() >= 3 {
                result.push(chain);
            }
        }
    }
    result
}

/// Drop vertices whose interior angle is within `eps` of a straight line
///
/// Never reduces a loop below three vertices.
pub fn remove_collinear(points: &[Vec2], indices: &[u32], eps: f32) -> Vec<u32> {
    let mut out: Vec<u32> = indices.to_vec();
    let mut changed = true;
    while changed && out.len() > 3 {
        changed = false;
        let n = out.len();
        for i in 0..n {
            let a = points[out[(i + n - 1) % n] as usize];
            let b = points[out[i] as usize];
            let c = points[out[(i + 1) % n] as usize];
            let cross = (b - a).perp_dot(c - b);
            let scale = (b - a).length() * (c - b).length();
            if scale <= f32::EPSILON || (cross / scale).abs() < eps && (b - a).dot(c - b) > 0.0 {
                out.remove(i);
                changed = true;
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_signed_area_ccw_positive() {
        assert!((signed_area(&square()) - 1.0).abs() < 1e-6);
        let mut cw = square();
        cw.reverse();
        assert!(signed_area(&cw) < 0.0);
    }

    #[test]
    fn test_interior_angles_square() {
        for a in interior_angles(&square()) {
            assert!((a - FRAC_PI_2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_reflex_angle_detected() {
        // L-shape has one reflex corner at (1,1)
        let l = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        let reflex = interior_angles(&l)
            .into_iter()
            .filter(|a| *a > std::f32::consts::PI)
            .count();
        assert_eq!(reflex, 1);
        let tris = triangulate(&l);
        assert_eq!(tris.len(), 4);
        let area: f32 = tris
            .iter()
            .map(|t| signed_area(&[l[t[0]], l[t[1]], l[t[2]]]))
            .sum();
        assert!((area - 3.0).abs() < 1e-5, "triangulation should cover the L");
    }

    #[test]
    fn test_circle_polygon() {
        let sq = square();
        assert!(circle_intersects_polygon(Vec2::new(0.5, 0.5), 0.01, &sq));
        assert!(circle_intersects_polygon(Vec2::new(1.5, 0.5), 0.6, &sq));
        assert!(!circle_intersects_polygon(Vec2::new(3.0, 3.0), 0.5, &sq));
    }

    #[test]
    fn test_boundary_of_two_cells_is_one_loop() {
        // 0-1-2 / 3-4-5 lattice, two unit cells sharing edge 1-4
        let a: Vec<u32> = vec![0, 1, 4, 3];
        let b: Vec<u32> = vec![1, 2, 5, 4];
        let loops = boundary_loops([a.as_slice(), b.as_slice()]);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 6);
        assert!(!loops[0].contains(&9));
    }

    #[test]
    fn test_remove_collinear_keeps_corners() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let out = remove_collinear(&points, &[0, 1, 2, 3, 4], 1e-4);
        assert_eq!(out, vec![0, 2, 3, 4]);
    }
}
