// LLM prompt constants for résumé feedback.

/// Shape the model must answer with. Mirrors `models::resume::Feedback`.
pub const FEEDBACK_RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; // max 100
  ATS: {
    score: number; // rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; // give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string; // make it a short "title" for the actual explanation
      explanation: string; // explain in detail here
    }[]; // give 3-4 tips
  };
  content: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  structure: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  skills: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
}"#;

/// Feedback instruction template.
/// Replace: {job_title}, {job_description}, {response_format}
pub const FEEDBACK_PROMPT_TEMPLATE: &str = r#"You are an expert in ATS (Applicant Tracking System) and resume analysis.
Please analyze and rate this resume and suggest how to improve it.
The rating can be low if the resume is bad.
Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.
If there is a lot to improve, don't hesitate to give low scores. This is to help the user to improve their resume.
If available, use the job description for the job the user is applying to in order to give more detailed feedback.
If provided, take the job description into consideration.
The job title is: {job_title}
The job description is: {job_description}
Provide the feedback using the following format:
{response_format}
Return the analysis as a JSON object, without any other text and without the backticks.
Every score is an integer between 0 and 100.
Do not include any other text or comments."#;

/// Header separating the instructions from the résumé text.
pub const RESUME_SECTION_HEADER: &str = "RESUME CONTENT:";
