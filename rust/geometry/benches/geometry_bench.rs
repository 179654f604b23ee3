// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use clash_lite_geometry::{Aabb, Mesh, Octree, Point3, Triangle};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_triangle(rng: &mut StdRng) -> Triangle {
    let mut p = || Point3::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0));
    Triangle::new(p(), p(), p())
}

fn bench_triangle_predicate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let pairs: Vec<(Triangle, Triangle)> = (0..1024)
        .map(|_| (random_triangle(&mut rng), random_triangle(&mut rng)))
        .collect();

    c.bench_function("triangle_intersects_1024", |b| {
        b.iter(|| {
            pairs
                .iter()
                .filter(|(t1, t2)| t1.intersects(black_box(t2), 1e-5, 1e-10))
                .count()
        })
    });
}

fn bench_octree_insert(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let boxes: Vec<Aabb> = (0..10_000)
        .map(|_| {
            let x = rng.gen_range(0.0..99.0);
            let y = rng.gen_range(0.0..99.0);
            let z = rng.gen_range(0.0..99.0);
            Aabb::from_minmax([x, y, z, x + 0.5, y + 0.5, z + 0.5])
        })
        .collect();
    let root = Aabb::from_minmax([0.0, 0.0, 0.0, 100.0, 100.0, 100.0]);

    c.bench_function("octree_insert_10k", |b| {
        b.iter(|| {
            let mut tree = Octree::new(root).unwrap();
            for (i, bounds) in boxes.iter().enumerate() {
                tree.insert(*bounds, i).unwrap();
            }
            tree.node_count()
        })
    });
}

fn bench_closedness(c: &mut Criterion) {
    c.bench_function("cuboid_closedness", |b| {
        b.iter(|| Mesh::cuboid(Point3::origin(), black_box(Point3::new(1.0, 2.0, 3.0))).is_closed())
    });
}

criterion_group!(benches, bench_triangle_predicate, bench_octree_insert, bench_closedness);
criterion_main!(benches);
