//! Packing-instruction preview page.

use askama::Template;
use axum::extract::{Path, State};
use pcf_core::transform::{
    transform_individual_assortment_response, transform_raw_to_assortment_data, AssortmentData,
    MergedImage,
};
use pcf_core::{DataSource, Dimensions, FormData, ImageBucket};

use crate::error::Result;
use crate::routes::assortment::fetch_record;
use crate::state::AppState;

/// Preview page template.
#[derive(Template)]
#[template(path = "preview.html")]
pub struct PreviewTemplate {
    pub item_no: String,
    pub name: String,
    pub customer: String,
    pub customer_po: String,
    pub order_name: String,
    pub data_source: String,
    pub dimensions: Vec<DimensionRow>,
    pub form: Option<FormData>,
    pub sections: Vec<ImageSection>,
    pub image_count: usize,
}

/// One dimensions table row.
pub struct DimensionRow {
    pub label: &'static str,
    pub value: String,
}

/// Images of one bucket (or one item pack).
pub struct ImageSection {
    pub title: String,
    pub images: Vec<PreviewImage>,
}

/// A rendered image tile.
pub struct PreviewImage {
    pub label: String,
    pub src: String,
    pub uploaded: bool,
}

/// Render the preview for an assortment.
pub async fn preview_page(
    State(state): State<AppState>,
    Path(assortment_id): Path<String>,
) -> Result<PreviewTemplate> {
    let (source, record) = fetch_record(&state, &assortment_id).await?;
    let data = match source {
        DataSource::Individual => transform_individual_assortment_response(record),
        DataSource::SalesOrder => transform_raw_to_assortment_data(record, source),
    };
    Ok(build_template(&data))
}

fn format_dimensions(dimensions: &Dimensions) -> String {
    format!(
        "{} × {} × {}",
        dimensions.length, dimensions.width, dimensions.height
    )
}

fn image_src(image: &MergedImage) -> String {
    match image {
        MergedImage::Webhook(entry) if entry.image.starts_with("data:") => entry.image.clone(),
        MergedImage::Webhook(entry) => format!(
            "data:{};base64,{}",
            entry
                .image_mime_type
                .as_deref()
                .unwrap_or(pcf_core::hash::DEFAULT_MIME_TYPE),
            entry.image
        ),
        MergedImage::Uploaded(upload) => upload.url.clone(),
    }
}

fn build_template(data: &AssortmentData) -> PreviewTemplate {
    let base = &data.base_assortment;
    let labels = &data.merged_data.image_labels;

    let mut sections: Vec<ImageSection> = Vec::new();
    data.merged_data.all_images.for_each(|bucket, pack, _, image| {
        let title = match (bucket, pack) {
            (ImageBucket::ItemPack, Some(pack)) => format!("{} {}", bucket.title(), pack + 1),
            _ => bucket.title().to_string(),
        };
        let (label, uploaded) = match image {
            MergedImage::Webhook(entry) => (
                labels
                    .get(&entry.filename)
                    .cloned()
                    .unwrap_or_else(|| entry.component_name.clone()),
                false,
            ),
            MergedImage::Uploaded(upload) => (
                labels
                    .get(&upload.filename)
                    .cloned()
                    .unwrap_or_else(|| upload.original_name.clone()),
                true,
            ),
        };
        let tile = PreviewImage {
            label,
            src: image_src(image),
            uploaded,
        };
        match sections.last_mut() {
            Some(section) if section.title == title => section.images.push(tile),
            _ => sections.push(ImageSection {
                title,
                images: vec![tile],
            }),
        }
    });

    PreviewTemplate {
        item_no: base.item_no.clone(),
        name: base.name.clone(),
        customer: base.customer.clone(),
        customer_po: base.customer_po.clone(),
        order_name: base.order_name.clone(),
        data_source: match data.metadata.data_source {
            DataSource::Individual => "individual".to_string(),
            DataSource::SalesOrder => "sales order".to_string(),
        },
        dimensions: vec![
            DimensionRow {
                label: "Item",
                value: format_dimensions(&base.item_dimensions),
            },
            DimensionRow {
                label: "Inner carton",
                value: format_dimensions(&base.inner_carton_dimensions),
            },
            DimensionRow {
                label: "Master carton",
                value: format_dimensions(&base.master_carton_dimensions),
            },
        ],
        form: data
            .user_modifications
            .as_ref()
            .map(|modifications| modifications.form_data.clone()),
        sections,
        image_count: data.merged_data.combined_image_count,
    }
}
