//! Template compilation and instantiation benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::rc::Rc;
use weft::*;

const SIMPLE: &str = "<div class=\"row\">Hello ${name}!</div>";

const COMPLEX: &str = r#"
<section title.bind="heading">
    <h1>${heading}</h1>
    <my-card header-text.bind="title" footer="static">
        <template replace-part="header"><b>${title}</b></template>
        <p slot="body">${body}</p>
    </my-card>
    <ul>
        <li when.bind="showFirst">${first}</li>
    </ul>
    <let total.bind="count"></let>
</section>
"#;

fn resources_with_behaviors() -> Rc<ViewResources> {
    let resources = Rc::new(ViewResources::root());
    resources
        .register_element(
            HtmlBehaviorResource::element("my-card")
                .with_bindable(BindableProperty::new("headerText"))
                .with_bindable(BindableProperty::new("footer"))
                .with_inline_view("<div><slot name=\"body\"></slot></div>"),
        )
        .unwrap();
    resources
        .register_attribute(HtmlBehaviorResource::template_controller("when"))
        .unwrap();
    resources
}

fn bench_simple_compilation(c: &mut Criterion) {
    let resources = Rc::new(ViewResources::root());
    c.bench_function("simple_compilation", |b| {
        b.iter(|| compile_markup(black_box(SIMPLE), &resources).unwrap())
    });
}

fn bench_complex_compilation(c: &mut Criterion) {
    let resources = resources_with_behaviors();
    c.bench_function("complex_compilation", |b| {
        b.iter(|| compile_markup(black_box(COMPLEX), &resources).unwrap())
    });
}

fn bench_instantiation(c: &mut Criterion) {
    let resources = Rc::new(ViewResources::root());
    let factory = compile_markup(SIMPLE, &resources).unwrap();
    let scope = Scope::new(BindingContext::from_pairs(&[(
        "name",
        Value::String("bench".into()),
    )]));

    c.bench_function("view_instantiation", |b| {
        b.iter(|| {
            factory
                .create(
                    &resources,
                    ViewCreateInstruction {
                        scope: Some(black_box(scope.clone())),
                        ..Default::default()
                    },
                )
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_complex_compilation,
    bench_instantiation
);
criterion_main!(benches);
