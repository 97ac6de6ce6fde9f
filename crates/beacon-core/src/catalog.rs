//! Standard back-office channels and the authorizers that govern them.
//!
//! Each back-office section gets one [`PolicyAuthorizer`] over the channels
//! it owns; no channel belongs to two sections. [`CURRENT_USER`] carries a
//! user's own events and only requires a resolvable user key.

use std::sync::Arc;

use crate::{Channel, ChannelAuthorizer, PolicyAuthorizer, PolicyEvaluator, SelfAuthorizer};

/// Documents (content items).
pub const DOCUMENT: Channel = Channel::from_static("backoffice:document");
/// Document types.
pub const DOCUMENT_TYPE: Channel = Channel::from_static("backoffice:document-type");
/// Media items.
pub const MEDIA: Channel = Channel::from_static("backoffice:media");
/// Media types.
pub const MEDIA_TYPE: Channel = Channel::from_static("backoffice:media-type");
/// Members.
pub const MEMBER: Channel = Channel::from_static("backoffice:member");
/// Member types.
pub const MEMBER_TYPE: Channel = Channel::from_static("backoffice:member-type");
/// Member groups.
pub const MEMBER_GROUP: Channel = Channel::from_static("backoffice:member-group");
/// Data types.
pub const DATA_TYPE: Channel = Channel::from_static("backoffice:data-type");
/// Dictionary items.
pub const DICTIONARY_ITEM: Channel = Channel::from_static("backoffice:dictionary-item");
/// Languages.
pub const LANGUAGE: Channel = Channel::from_static("backoffice:language");
/// Templates.
pub const TEMPLATE: Channel = Channel::from_static("backoffice:template");
/// Partial views.
pub const PARTIAL_VIEW: Channel = Channel::from_static("backoffice:partial-view");
/// Scripts.
pub const SCRIPT: Channel = Channel::from_static("backoffice:script");
/// Stylesheets.
pub const STYLESHEET: Channel = Channel::from_static("backoffice:stylesheet");
/// Relation types.
pub const RELATION_TYPE: Channel = Channel::from_static("backoffice:relation-type");
/// Users.
pub const USER: Channel = Channel::from_static("backoffice:user");
/// User groups.
pub const USER_GROUP: Channel = Channel::from_static("backoffice:user-group");
/// Webhooks.
pub const WEBHOOK: Channel = Channel::from_static("backoffice:webhook");
/// The connected user's own record.
pub const CURRENT_USER: Channel = Channel::from_static("backoffice:current-user");

/// Section access policies.
pub mod policy {
    /// Content section.
    pub const CONTENT: &str = "section.content";
    /// Media section.
    pub const MEDIA: &str = "section.media";
    /// Members section.
    pub const MEMBERS: &str = "section.members";
    /// Settings section.
    pub const SETTINGS: &str = "section.settings";
    /// Translation section.
    pub const TRANSLATION: &str = "section.translation";
    /// Users section.
    pub const USERS: &str = "section.users";
}

/// Authorizers for every catalogue channel, in registration order.
///
/// Typically passed straight to
/// [`AuthorizerIndexBuilder::register_all`](crate::AuthorizerIndexBuilder::register_all).
pub fn standard_authorizers(
    evaluator: Arc<dyn PolicyEvaluator>,
) -> Vec<Arc<dyn ChannelAuthorizer>> {
    let section = |policy: &str, channels: Vec<Channel>| -> Arc<dyn ChannelAuthorizer> {
        Arc::new(PolicyAuthorizer::new(policy, channels, Arc::clone(&evaluator)))
    };

    vec![
        section(policy::CONTENT, vec![DOCUMENT]),
        section(policy::MEDIA, vec![MEDIA]),
        section(policy::MEMBERS, vec![MEMBER, MEMBER_GROUP]),
        section(policy::SETTINGS, vec![
            DOCUMENT_TYPE,
            MEDIA_TYPE,
            MEMBER_TYPE,
            DATA_TYPE,
            LANGUAGE,
            TEMPLATE,
            PARTIAL_VIEW,
            SCRIPT,
            STYLESHEET,
            RELATION_TYPE,
            WEBHOOK,
        ]),
        section(policy::TRANSLATION, vec![DICTIONARY_ITEM]),
        section(policy::USERS, vec![USER, USER_GROUP]),
        Arc::new(SelfAuthorizer::new([CURRENT_USER])),
    ]
}
