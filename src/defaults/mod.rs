use crate::models::IndexNode;
use crate::tree::{find_node, find_node_mut};

fn topic(id: &str, title: &str) -> IndexNode {
    IndexNode {
        id: id.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

fn section(id: &str, title: &str, topics: Vec<IndexNode>) -> IndexNode {
    let parent = id.to_string();
    IndexNode::container(id, title).with_children(
        topics
            .into_iter()
            .map(|t| IndexNode {
                parent_id: Some(parent.clone()),
                ..t
            })
            .collect(),
    )
}

/// Outline used when nothing is stored locally or the store cannot be reached.
pub fn default_outline() -> Vec<IndexNode> {
    vec![
        section("revision-matrices-vectores", "a. Review of Matrices and Vectors", vec![]),
        section(
            "revision-probabilidad-variables-aleatorias",
            "b. Review of Probability and Random Variables",
            vec![
                topic("momentos-valor-esperado", "b.1 Moments and Expected Value"),
                topic("funcion-densidad-gaussiana", "b.2 Gaussian Probability Density"),
                topic("varias-variables-aleatorias", "b.3 Several Random Variables"),
                topic("densidad-gaussiana-multivariable", "b.4 Multivariate Gaussian Density"),
                topic(
                    "transformaciones-lineales-variables-aleatorias",
                    "b.5 Linear Transformations of Random Variables",
                ),
            ],
        ),
        section("revision-sistemas-lineales", "c. Review of Linear Systems", vec![]),
        section(
            "introduccion",
            "1. Introduction",
            vec![
                topic("introduccion-1", "Origins of Image Processing"),
                topic("introduccion-2", "Application Examples"),
                topic("introduccion-3", "Components of an Image Processing System"),
            ],
        ),
        section(
            "fundamentos",
            "2. Digital Image Fundamentals",
            vec![
                topic("fundamentos-1", "Elements of Visual Perception"),
                topic("fundamentos-2", "Sampling and Quantization"),
                topic("fundamentos-3", "Relationships Between Pixels"),
            ],
        ),
        section("transformaciones", "3. Intensity Transformations", vec![]),
        section("filtrado-frecuencia", "4. Filtering in the Frequency Domain", vec![]),
        section("restauracion", "5. Image Restoration and Reconstruction", vec![]),
        section("procesamiento-color", "6. Color Image Processing", vec![]),
        section("ondiculas", "7. Wavelets and Other Transforms", vec![]),
        section("compresion", "8. Image Compression", vec![]),
        section("morfologico", "9. Morphological Processing", vec![]),
        section("segmentacion", "10. Image Segmentation", vec![]),
    ]
}

/// Add every default topic missing from `stored`, keeping the stored arrangement.
///
/// A missing topic goes under its default parent when that parent exists anywhere in the
/// tree, otherwise at the root. Nodes already present are left where the user put them.
pub fn merge_default_topics(stored: &[IndexNode], defaults: &[IndexNode]) -> Vec<IndexNode> {
    let mut out = stored.to_vec();
    for node in defaults {
        ensure_topic(&mut out, node, None);
    }
    out
}

fn ensure_topic(tree: &mut Vec<IndexNode>, wanted: &IndexNode, parent_id: Option<&str>) {
    if find_node(tree, &wanted.id).is_none() {
        let fresh = IndexNode {
            id: wanted.id.clone(),
            title: wanted.title.clone(),
            parent_id: parent_id.map(str::to_string),
            ..Default::default()
        };
        let parent = parent_id.and_then(|p| find_node_mut(tree, p));
        match parent {
            Some(parent) => parent.children.get_or_insert_with(Vec::new).push(fresh),
            None => tree.push(IndexNode {
                parent_id: None,
                ..fresh
            }),
        }
    }

    if wanted.children.is_some() {
        if let Some(existing) = find_node_mut(tree, &wanted.id) {
            existing.children.get_or_insert_with(Vec::new);
        }
    }
    for child in wanted.children() {
        ensure_topic(tree, child, Some(&wanted.id));
    }
}
