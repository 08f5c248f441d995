use crate::server::ServerError;
use inkwell_common::model::{
    Id,
    group::GroupMarker,
    post::{BodyText, IMAGE_REF_MAX_LEN, ImageRef, PostContent},
};
use inkwell_db::store::Store;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Display};

pub const REQUIRED: &str = "This field is required.";
pub const UNKNOWN_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Messages per offending form field.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Display) {
        self.0.entry(field).or_default().push(message.to_string());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Submitted post, before validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

impl PostForm {
    pub async fn validate(self, store: &dyn Store) -> Result<PostContent, ServerError> {
        let mut errors = FieldErrors::default();

        let text = BodyText::new(self.text)
            .inspect_err(|_| errors.add("text", REQUIRED))
            .ok();

        if let Some(group_id) = self.group
            && store.fetch_group(group_id).await?.is_none()
        {
            errors.add("group", UNKNOWN_GROUP);
        }

        // An empty image field means no image.
        let image = match self.image.filter(|image| !image.is_empty()) {
            None => Some(None),
            Some(image) => ImageRef::new(image)
                .inspect_err(|_| {
                    errors.add(
                        "image",
                        format_args!(
                            "Ensure this value has at most {IMAGE_REF_MAX_LEN} characters."
                        ),
                    );
                })
                .ok()
                .map(Some),
        };

        if let (Some(text), Some(image)) = (text, image)
            && errors.is_empty()
        {
            Ok(PostContent {
                text,
                group: self.group,
                image,
            })
        } else {
            Err(ServerError::Validation(errors))
        }
    }
}

/// Submitted comment, before validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(self) -> Result<BodyText, ServerError> {
        BodyText::new(self.text).map_err(|_| {
            let mut errors = FieldErrors::default();
            errors.add("text", REQUIRED);
            ServerError::Validation(errors)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{
        ServerError,
        forms::{CommentForm, PostForm, REQUIRED, UNKNOWN_GROUP},
    };
    use inkwell_common::model::group::{CreateGroup, GroupSlug, GroupTitle};
    use inkwell_db::{memory::MemoryStore, store::Store};
    use serde_json::{Value, json};
    use std::fmt::Debug;

    fn field_errors<T: Debug>(result: Result<T, ServerError>) -> Value {
        match result {
            Err(ServerError::Validation(errors)) => serde_json::to_value(errors).unwrap(),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_post_form() {
        let store = MemoryStore::default();
        let group = store
            .create_group(&CreateGroup {
                slug: GroupSlug::new("cats".to_owned()).unwrap(),
                title: GroupTitle::new("Cats".to_owned()).unwrap(),
                description: String::new(),
            })
            .await
            .unwrap();
        let form = PostForm {
            text: "Hello".to_owned(),
            group: Some(group),
            image: Some(String::new()),
        };

        let content = form.validate(&store).await.unwrap();

        assert_eq!(content.text.get(), "Hello");
        assert_eq!(content.group, Some(group));
        assert_eq!(content.image, None);
    }

    #[tokio::test]
    async fn invalid_post_form_reports_every_field() {
        let store = MemoryStore::default();
        let form = PostForm {
            text: "   ".to_owned(),
            group: Some(12345_u64.into()),
            image: Some("x".repeat(101)),
        };

        let errors = field_errors(form.validate(&store).await);

        assert_eq!(
            errors,
            json!({
                "text": [REQUIRED],
                "group": [UNKNOWN_GROUP],
                "image": ["Ensure this value has at most 100 characters."],
            })
        );
    }

    #[test]
    fn blank_comment_is_rejected() {
        let errors = field_errors(CommentForm { text: "\n".to_owned() }.validate());

        assert_eq!(errors, json!({ "text": [REQUIRED] }));
        assert!(CommentForm { text: "Nice".to_owned() }.validate().is_ok());
    }
}
