use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::domain::{AgeRange, Gender, InterestedIn, Location, MessageType, Profile, User};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationInput {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[serde(default)]
    pub city: String,
}

impl From<LocationInput> for Location {
    fn from(input: LocationInput) -> Self {
        Location {
            latitude: input.latitude,
            longitude: input.longitude,
            city: input.city,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_age_range"))]
pub struct AgeRangeInput {
    #[validate(range(min = 18, max = 100))]
    pub min: u8,
    #[validate(range(min = 18, max = 100))]
    pub max: u8,
}

/// Names hold 1 to 50 characters once surrounding whitespace is trimmed
fn validate_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 || length > 50 {
        return Err(ValidationError::new("name_length"));
    }
    Ok(())
}

fn validate_age_range(range: &AgeRangeInput) -> Result<(), ValidationError> {
    if range.min > range.max {
        return Err(ValidationError::new("age_range_order"));
    }
    Ok(())
}

/// Create the profile of the authenticated user
///
/// POST /api/v1/users
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(range(min = 18, max = 100))]
    pub age: u8,
    pub gender: Gender,
    #[serde(rename = "interestedIn")]
    pub interested_in: InterestedIn,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub bio: String,
    #[serde(default)]
    #[validate(nested)]
    pub location: Option<LocationInput>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    #[validate(nested)]
    pub preferences: Option<PreferencesPatch>,
}

impl RegisterUserRequest {
    /// Validate and split into the profile and optional initial preferences
    pub fn into_parts(self) -> Result<(Profile, Option<PreferencesPatch>), AppError> {
        self.validate()?;

        let profile = Profile {
            name: self.name.trim().to_string(),
            age: self.age,
            gender: self.gender,
            interested_in: self.interested_in,
            bio: self.bio,
            location: self.location.map(Location::from).unwrap_or_default(),
            photos: Vec::new(),
            interests: self.interests,
            education: self.education,
            occupation: self.occupation,
        };
        Ok((profile, self.preferences))
    }
}

/// Partial profile update; absent fields are left as they are
///
/// PUT /api/v1/users/profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(custom(function = "validate_name"))]
    pub name: Option<String>,
    #[validate(range(min = 18, max = 100))]
    pub age: Option<u8>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
    pub education: Option<String>,
    pub occupation: Option<String>,
    #[validate(nested)]
    pub location: Option<LocationInput>,
}

impl ProfilePatch {
    pub fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(bio) = self.bio {
            profile.bio = bio;
        }
        if let Some(interests) = self.interests {
            profile.interests = interests;
        }
        if let Some(education) = self.education {
            profile.education = education;
        }
        if let Some(occupation) = self.occupation {
            profile.occupation = occupation;
        }
        if let Some(location) = self.location {
            profile.location = location.into();
        }
    }
}

/// Partial preferences update
///
/// PUT /api/v1/users/preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PreferencesPatch {
    #[serde(rename = "ageRange")]
    #[validate(nested)]
    pub age_range: Option<AgeRangeInput>,
    #[serde(rename = "maxDistance")]
    #[validate(range(min = 1, max = 500))]
    pub max_distance: Option<u16>,
    #[serde(rename = "interestedIn")]
    pub interested_in: Option<InterestedIn>,
}

impl PreferencesPatch {
    /// Validate and merge into a user's preferences
    pub fn apply(self, user: &mut User) -> Result<(), AppError> {
        self.validate()?;

        if let Some(range) = self.age_range {
            user.preferences.age_range = AgeRange { min: range.min, max: range.max };
        }
        if let Some(max_distance) = self.max_distance {
            user.preferences.max_distance_km = max_distance;
        }
        if let Some(interested_in) = self.interested_in {
            user.profile.interested_in = interested_in;
        }
        Ok(())
    }
}

/// POST /api/v1/users/photos, PUT /api/v1/users/photos/main, DELETE /api/v1/users/photos
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhotoRequest {
    #[validate(url)]
    pub url: String,
}

/// POST /api/v1/messages/{matchId}
///
/// Content is checked after trimming by the thread service, not here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, rename = "messageType")]
    pub message_type: MessageType,
    #[serde(default, rename = "imageUrl")]
    #[validate(url)]
    pub image_url: Option<String>,
}

/// `?page&limit` query string shared by paginated endpoints
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}
