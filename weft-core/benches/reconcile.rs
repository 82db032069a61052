use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use weft_core::component::CollectionView;
use weft_core::dom::Document;
use weft_core::reactive::Disposable;
use weft_core::vdom::{h, Mounted, Reconciler, VNode};

const ROWS: u32 = 1_000;

fn rows(order: impl Iterator<Item = u32>) -> VNode {
    h("tbody")
        .children(order.map(|id| {
            h("tr")
                .key(id)
                .child(h("td").text(&id.to_string()))
                .child(h("td").attr("class", "label").text("row"))
        }))
        .build()
}

fn mounted(doc: &Document, reconciler: &Reconciler) -> Mounted {
    let mounted = reconciler.patch(doc, None, &rows(0..ROWS)).unwrap();
    doc.append_child(doc.root(), mounted.node()).unwrap();
    mounted
}

fn keyed_patch(c: &mut Criterion) {
    let reconciler = Reconciler::new();
    let reversed = rows((0..ROWS).rev());
    let rotated = rows((1..ROWS).chain(0..1));
    let unchanged = rows(0..ROWS);

    c.bench_function("keyed/unchanged", |b| {
        b.iter_batched(
            || {
                let doc = Document::new();
                let base = mounted(&doc, &reconciler);
                (doc, base)
            },
            |(doc, base)| black_box(reconciler.patch(&doc, Some(base), &unchanged).unwrap()),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("keyed/rotate", |b| {
        b.iter_batched(
            || {
                let doc = Document::new();
                let base = mounted(&doc, &reconciler);
                (doc, base)
            },
            |(doc, base)| black_box(reconciler.patch(&doc, Some(base), &rotated).unwrap()),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("keyed/reverse", |b| {
        b.iter_batched(
            || {
                let doc = Document::new();
                let base = mounted(&doc, &reconciler);
                (doc, base)
            },
            |(doc, base)| black_box(reconciler.patch(&doc, Some(base), &reversed).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn collection_refresh(c: &mut Criterion) {
    let forward: Vec<u32> = (0..ROWS).collect();
    let shuffled: Vec<u32> = (0..ROWS).map(|i| (i * 7919) % ROWS).collect();

    c.bench_function("collection/reorder", |b| {
        b.iter_batched(
            || {
                let doc = Document::new();
                let parent = doc.create_element("ul");
                let factory_doc = doc.clone();
                let mut view = CollectionView::new(
                    &doc,
                    parent,
                    |id: &u32| *id,
                    move |_: &u32| (factory_doc.create_element("li"), Disposable::noop()),
                    |_: &u32, _| {},
                );
                view.refresh(&forward).unwrap();
                (doc, view)
            },
            |(_doc, mut view)| black_box(view.refresh(&shuffled).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, keyed_patch, collection_refresh);
criterion_main!(benches);
