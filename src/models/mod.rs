pub mod catalog;
pub mod creative;
pub mod user;

pub use catalog::{Artist, ArtistFields, Modifier, ModifierFields};
pub use creative::{
    Creative, CreativeArtifact, CreativeArtist, CreativeModifier, NewArtifact, NewCreative,
    NewJoin, UpdateCreative,
};
pub use user::{AppUser, ArtifactLike, NewAppUser, Session, UserProfile, ROLE_ADMIN, ROLE_MODERATOR};
