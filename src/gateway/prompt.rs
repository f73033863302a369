//! Fixed prompts sent to vision models.

/// Prompt for scoring a single photograph.
pub const SINGLE_IMAGE: &str = "\
You are a professional photo editor culling a shoot. Evaluate this photograph \
on four independent axes, each scored from 0 to 100:
- compositionScore: framing, balance, subject placement, leading lines
- lightingScore: exposure, direction and quality of light, dynamic range
- technicalScore: focus accuracy, sharpness, noise, motion blur
- artisticScore: mood, storytelling, creativity, emotional impact

Then give totalScore (0-100), your overall judgment. It does not have to be \
the average of the four axes; weigh them as an experienced editor would.
Set isWorthKeeping to true if the photo deserves to stay in the library and \
false if it should be discarded.
Write feedback as at most two sentences explaining the verdict.

Respond with a single JSON object containing exactly these fields: \
compositionScore, lightingScore, technicalScore, artisticScore, totalScore, \
isWorthKeeping, feedback.";

/// Prompt for scoring a burst of near-duplicate photographs.
pub const BURST: &str = "\
You are a professional photo editor. The following photographs were taken in \
quick succession and show nearly the same scene. Compare them and keep only \
the best ones; usually exactly one is worth keeping.

For every photograph, score compositionScore, lightingScore, technicalScore \
and artisticScore (0-100 each), an overall totalScore (0-100), set \
isWorthKeeping, and write feedback of at most two sentences. For discarded \
photos, phrase feedback as \"Discarded in favor of <winner file name> due to \
<reason>\".

Each photograph is preceded by its file name. Respond with a JSON array with \
one element per photograph, each of the form \
{\"fileName\": \"<file name>\", \"evaluation\": {<the seven fields>}}.";

/// Caption placed before each image of a burst request.
#[must_use]
pub fn burst_caption(file_name: &str) -> String {
    format!("File name: {file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_name_every_field() {
        for field in [
            "compositionScore",
            "lightingScore",
            "technicalScore",
            "artisticScore",
            "totalScore",
            "isWorthKeeping",
            "feedback",
        ] {
            assert!(SINGLE_IMAGE.contains(field), "single prompt lacks {field}");
        }
        assert!(BURST.contains("fileName"));
        assert_eq!(burst_caption("IMG_1.jpg"), "File name: IMG_1.jpg");
    }
}
